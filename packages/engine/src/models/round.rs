use serde::{Deserialize, Serialize};

use crate::models::{
    errors::GameRuleError, match_session::Side, question::RoundQuestion, CategoryId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    AwaitingCategory,
    AwaitingAnswers,
    Complete,
}

/// One answer as sent by a side. `selected_option: None` or `timed_out: true`
/// both record the question as unanswered in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub selected_option: Option<usize>,
    pub time_taken_ms: u64,
    #[serde(default)]
    pub timed_out: bool,
}

impl SubmittedAnswer {
    pub fn choose(selected_option: usize, time_taken_ms: u64) -> Self {
        SubmittedAnswer {
            selected_option: Some(selected_option),
            time_taken_ms,
            timed_out: false,
        }
    }

    pub fn timeout(time_taken_ms: u64) -> Self {
        SubmittedAnswer {
            selected_option: None,
            time_taken_ms,
            timed_out: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub selected_option: Option<usize>,
    pub correct: bool,
    pub time_taken_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_number: u32,
    pub category: Option<CategoryId>,
    pub question_count: usize,
    pub correct_a: u32,
    pub correct_b: u32,
}

impl RoundResult {
    pub fn correct_for(&self, side: Side) -> u32 {
        match side {
            Side::A => self.correct_a,
            Side::B => self.correct_b,
        }
    }

    pub fn is_perfect_for(&self, side: Side) -> bool {
        self.question_count > 0 && self.correct_for(side) as usize == self.question_count
    }
}

/// A single round: category choice, a fixed question batch, and one answer
/// batch per side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub round_number: u32,
    /// Side entitled to pick the category. `None` when the category is fixed
    /// for the whole match.
    pub chooser: Option<Side>,
    pub category: Option<CategoryId>,
    pub question_count: usize,
    pub questions: Vec<RoundQuestion>,
    pub answers_a: Option<Vec<AnswerRecord>>,
    pub answers_b: Option<Vec<AnswerRecord>>,
    pub state: RoundState,
}

impl Round {
    pub fn new(round_number: u32, question_count: usize, chooser: Side) -> Self {
        Round {
            round_number,
            chooser: Some(chooser),
            category: None,
            question_count,
            questions: vec![],
            answers_a: None,
            answers_b: None,
            state: RoundState::AwaitingCategory,
        }
    }

    /// A round whose category is imposed by the match. It stays in
    /// `AwaitingCategory` until [`Round::assign_fixed_batch`] is applied. A
    /// stored round in this state is still waiting for its question batch.
    pub fn with_fixed_category(round_number: u32, question_count: usize, category: CategoryId) -> Self {
        Round {
            round_number,
            chooser: None,
            category: Some(category),
            question_count,
            questions: vec![],
            answers_a: None,
            answers_b: None,
            state: RoundState::AwaitingCategory,
        }
    }

    pub fn check_category_selection(&self, side: Side) -> Result<(), GameRuleError> {
        if self.state != RoundState::AwaitingCategory {
            return Err(GameRuleError::InvalidState(format!(
                "round {} is not awaiting a category",
                self.round_number
            )));
        }
        match self.chooser {
            None => Err(GameRuleError::InvalidState(format!(
                "round {} has a fixed category",
                self.round_number
            ))),
            Some(chooser) if chooser != side => Err(GameRuleError::WrongTurn(format!(
                "side {} chooses the category in round {}",
                chooser, self.round_number
            ))),
            Some(_) => Ok(()),
        }
    }

    pub fn select_category(
        &mut self,
        side: Side,
        category: CategoryId,
        questions: Vec<RoundQuestion>,
    ) -> Result<(), GameRuleError> {
        self.check_category_selection(side)?;
        self.fix_batch(category, questions)
    }

    pub fn assign_fixed_batch(&mut self, questions: Vec<RoundQuestion>) -> Result<(), GameRuleError> {
        if self.state != RoundState::AwaitingCategory {
            return Err(GameRuleError::InvalidState(format!(
                "round {} already has its questions",
                self.round_number
            )));
        }
        let category = match (self.chooser, self.category) {
            (None, Some(category)) => category,
            _ => {
                return Err(GameRuleError::InvalidState(format!(
                    "round {} has no fixed category",
                    self.round_number
                )))
            }
        };
        self.fix_batch(category, questions)
    }

    fn fix_batch(&mut self, category: CategoryId, questions: Vec<RoundQuestion>) -> Result<(), GameRuleError> {
        if questions.len() != self.question_count {
            return Err(GameRuleError::CategoryUnavailable(category));
        }
        self.category = Some(category);
        self.questions = questions;
        self.state = RoundState::AwaitingAnswers;
        Ok(())
    }

    pub fn has_submitted(&self, side: Side) -> bool {
        self.answers(side).is_some()
    }

    pub fn answers(&self, side: Side) -> Option<&[AnswerRecord]> {
        match side {
            Side::A => self.answers_a.as_deref(),
            Side::B => self.answers_b.as_deref(),
        }
    }

    pub fn correct_count(&self, side: Side) -> Option<u32> {
        self.answers(side)
            .map(|answers| answers.iter().filter(|answer| answer.correct).count() as u32)
    }

    /// Records a side's whole batch. Returns the round result when this
    /// submission is the one that completes the round.
    pub fn submit_answers(
        &mut self,
        side: Side,
        answers: &[SubmittedAnswer],
    ) -> Result<Option<RoundResult>, GameRuleError> {
        if self.state == RoundState::AwaitingCategory {
            return Err(GameRuleError::InvalidState(format!(
                "round {} has no questions yet",
                self.round_number
            )));
        }
        if self.has_submitted(side) {
            return Err(GameRuleError::DuplicateSubmission {
                round: self.round_number,
            });
        }
        if answers.len() != self.questions.len() {
            return Err(GameRuleError::AnswerCountMismatch {
                expected: self.questions.len(),
                received: answers.len(),
            });
        }

        let mut records = Vec::with_capacity(answers.len());
        for (index, (answer, question)) in answers.iter().zip(&self.questions).enumerate() {
            let selected_option = if answer.timed_out {
                None
            } else {
                answer.selected_option
            };
            if let Some(option) = selected_option {
                if option >= question.options.len() {
                    return Err(GameRuleError::InvalidOption {
                        question: index,
                        option,
                    });
                }
            }
            records.push(AnswerRecord {
                selected_option,
                correct: selected_option.is_some_and(|option| question.is_correct(option)),
                time_taken_ms: answer.time_taken_ms,
            });
        }

        match side {
            Side::A => self.answers_a = Some(records),
            Side::B => self.answers_b = Some(records),
        }

        if self.answers_a.is_some() && self.answers_b.is_some() {
            self.state = RoundState::Complete;
            return Ok(self.result());
        }
        Ok(None)
    }

    pub fn result(&self) -> Option<RoundResult> {
        if self.state != RoundState::Complete {
            return None;
        }
        Some(RoundResult {
            round_number: self.round_number,
            category: self.category,
            question_count: self.question_count,
            correct_a: self.correct_count(Side::A).unwrap_or(0),
            correct_b: self.correct_count(Side::B).unwrap_or(0),
        })
    }
}
