use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::{legacy::StoredRoundQuestion, CategoryId};

/// A question as held by the question store: one correct option plus a fixed
/// set of incorrect ones, in no particular order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Question {
    pub question_id: String,
    pub category_id: CategoryId,
    pub prompt: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

impl Question {
    pub fn new(
        question_id: &str,
        category_id: CategoryId,
        prompt: &str,
        correct_answer: &str,
        incorrect_answers: &[&str],
    ) -> Self {
        Question {
            question_id: question_id.to_string(),
            category_id,
            prompt: prompt.to_string(),
            correct_answer: correct_answer.to_string(),
            incorrect_answers: incorrect_answers.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// A question fixed into a round, with its option layout already decided.
///
/// Both sides read the same `options` vector, so the layout is identical for
/// everyone and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "StoredRoundQuestion")]
pub struct RoundQuestion {
    pub question_id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

impl RoundQuestion {
    /// Draws the presentation order for `question` once.
    pub fn shuffled<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> Self {
        // Index 0 is the correct answer; the layout is tracked by index so
        // duplicate option texts cannot move it.
        let mut layout: Vec<usize> = (0..=question.incorrect_answers.len()).collect();
        layout.shuffle(rng);

        let options = layout
            .iter()
            .map(|&i| match i {
                0 => question.correct_answer.clone(),
                i => question.incorrect_answers[i - 1].clone(),
            })
            .collect();
        let correct_option = layout.iter().position(|&i| i == 0).unwrap_or(0);

        RoundQuestion {
            question_id: question.question_id.clone(),
            prompt: question.prompt.clone(),
            options,
            correct_option,
        }
    }

    pub fn is_correct(&self, selected_option: usize) -> bool {
        self.correct_option == selected_option
    }
}

/// Player-facing projection of a round question. The correct option is only
/// revealed once the round is complete.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuestionView {
    pub question_id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: Option<usize>,
}

impl QuestionView {
    pub fn from_round_question(question: &RoundQuestion, reveal: bool) -> Self {
        QuestionView {
            question_id: question.question_id.clone(),
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            correct_option: reveal.then_some(question.correct_option),
        }
    }
}
