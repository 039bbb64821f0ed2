use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    errors::GameRuleError,
    question::RoundQuestion,
    rewards::MatchRewards,
    round::{Round, RoundResult, RoundState, SubmittedAnswer},
    CategoryId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Side that picks the category in `round_number`: A on odd rounds, B on
    /// even rounds.
    pub fn category_chooser(round_number: u32) -> Side {
        if round_number % 2 == 1 {
            Side::A
        } else {
            Side::B
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    Duel,
    Master,
    Squad,
}

impl MatchMode {
    pub fn default_total_rounds(&self) -> u32 {
        match self {
            MatchMode::Duel | MatchMode::Master => 5,
            MatchMode::Squad => 10,
        }
    }

    pub fn default_questions_per_round(&self) -> usize {
        match self {
            MatchMode::Duel | MatchMode::Master => 3,
            MatchMode::Squad => 1,
        }
    }

    pub fn players_per_side(&self) -> usize {
        match self {
            MatchMode::Duel | MatchMode::Master => 1,
            MatchMode::Squad => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Side(Side),
    Draw,
}

/// Who is expected to act next in an active match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    ChooseCategory(Side),
    /// Both sides answer the same batch independently.
    Answer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub side_a: u32,
    pub side_b: u32,
}

impl Scoreboard {
    pub fn get(&self, side: Side) -> u32 {
        match side {
            Side::A => self.side_a,
            Side::B => self.side_b,
        }
    }

    pub fn add(&mut self, result: &RoundResult) {
        self.side_a += result.correct_a;
        self.side_b += result.correct_b;
    }

    pub fn leader(&self) -> Winner {
        match self.side_a.cmp(&self.side_b) {
            std::cmp::Ordering::Greater => Winner::Side(Side::A),
            std::cmp::Ordering::Less => Winner::Side(Side::B),
            std::cmp::Ordering::Equal => Winner::Draw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettings {
    pub mode: MatchMode,
    #[serde(default)]
    pub total_rounds: Option<u32>,
    #[serde(default)]
    pub questions_per_round: Option<usize>,
    #[serde(default)]
    pub master_category: Option<CategoryId>,
}

impl MatchSettings {
    pub fn duel() -> Self {
        MatchSettings {
            mode: MatchMode::Duel,
            total_rounds: None,
            questions_per_round: None,
            master_category: None,
        }
    }

    pub fn master(category: CategoryId) -> Self {
        MatchSettings {
            mode: MatchMode::Master,
            total_rounds: None,
            questions_per_round: None,
            master_category: Some(category),
        }
    }

    pub fn squad() -> Self {
        MatchSettings {
            mode: MatchMode::Squad,
            total_rounds: None,
            questions_per_round: None,
            master_category: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    NextRound { round_number: u32 },
    Completed { winner: Winner },
    /// The round had already been folded into the score; nothing changed.
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSession {
    pub match_id: String,
    pub mode: MatchMode,
    pub side_a: Vec<String>,
    pub side_b: Vec<String>,
    pub status: MatchStatus,
    pub current_round: u32,
    pub total_rounds: u32,
    pub questions_per_round: usize,
    pub master_category: Option<CategoryId>,
    pub scores: Scoreboard,
    pub winner: Option<Winner>,
    pub surrendered_by: Option<Side>,
    pub rewards: Option<MatchRewards>,
    pub rounds: Vec<Round>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl MatchSession {
    /// Issues a new match in `Pending`. Side A is the challenger.
    pub fn new(
        settings: &MatchSettings,
        side_a: Vec<String>,
        side_b: Vec<String>,
    ) -> Result<Self, GameRuleError> {
        let mode = settings.mode;
        let per_side = mode.players_per_side();
        if side_a.len() != per_side || side_b.len() != per_side {
            return Err(GameRuleError::InvalidSettings(format!(
                "{:?} needs {} player(s) per side",
                mode, per_side
            )));
        }

        let mut everyone: Vec<&String> = side_a.iter().chain(side_b.iter()).collect();
        everyone.sort();
        everyone.dedup();
        if everyone.len() != per_side * 2 || everyone.iter().any(|id| id.is_empty()) {
            return Err(GameRuleError::InvalidSettings(
                "every player must be distinct and non-empty".to_string(),
            ));
        }

        match (mode, settings.master_category) {
            (MatchMode::Master, None) => {
                return Err(GameRuleError::InvalidSettings(
                    "master mode needs a category".to_string(),
                ))
            }
            (MatchMode::Duel | MatchMode::Squad, Some(_)) => {
                return Err(GameRuleError::InvalidSettings(
                    "only master mode fixes a category".to_string(),
                ))
            }
            _ => {}
        }

        let total_rounds = settings
            .total_rounds
            .unwrap_or_else(|| mode.default_total_rounds());
        let questions_per_round = settings
            .questions_per_round
            .unwrap_or_else(|| mode.default_questions_per_round());
        if total_rounds == 0 || questions_per_round == 0 {
            return Err(GameRuleError::InvalidSettings(
                "rounds and questions per round must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(MatchSession {
            match_id: Uuid::new_v4().to_string(),
            mode,
            side_a,
            side_b,
            status: MatchStatus::Pending,
            current_round: 1,
            total_rounds,
            questions_per_round,
            master_category: settings.master_category,
            scores: Scoreboard::default(),
            winner: None,
            surrendered_by: None,
            rewards: None,
            rounds: vec![],
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn players(&self, side: Side) -> &[String] {
        match side {
            Side::A => &self.side_a,
            Side::B => &self.side_b,
        }
    }

    pub fn all_players(&self) -> Vec<String> {
        self.side_a.iter().chain(self.side_b.iter()).cloned().collect()
    }

    pub fn side_of(&self, player_id: &str) -> Option<Side> {
        if self.side_a.iter().any(|id| id == player_id) {
            Some(Side::A)
        } else if self.side_b.iter().any(|id| id == player_id) {
            Some(Side::B)
        } else {
            None
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    pub fn round(&self, round_number: u32) -> Option<&Round> {
        self.rounds.iter().find(|round| round.round_number == round_number)
    }

    fn round_mut(&mut self, round_number: u32) -> Option<&mut Round> {
        self.rounds
            .iter_mut()
            .find(|round| round.round_number == round_number)
    }

    pub fn active_round(&self) -> Option<&Round> {
        self.round(self.current_round)
    }

    pub fn current_turn(&self) -> Option<Turn> {
        if self.status != MatchStatus::Active {
            return None;
        }
        let round = self.active_round()?;
        match (round.state, round.chooser) {
            (RoundState::AwaitingCategory, Some(chooser)) => Some(Turn::ChooseCategory(chooser)),
            (RoundState::AwaitingAnswers, _) => Some(Turn::Answer),
            _ => None,
        }
    }

    fn ensure_active(&self) -> Result<(), GameRuleError> {
        match self.status {
            MatchStatus::Active => Ok(()),
            MatchStatus::Completed => Err(GameRuleError::MatchFinalized),
            MatchStatus::Pending => Err(GameRuleError::InvalidState(
                "match has not been accepted".to_string(),
            )),
        }
    }

    fn ensure_pending(&self) -> Result<(), GameRuleError> {
        match self.status {
            MatchStatus::Pending => Ok(()),
            MatchStatus::Completed => Err(GameRuleError::MatchFinalized),
            MatchStatus::Active => Err(GameRuleError::InvalidState(
                "match is already active".to_string(),
            )),
        }
    }

    /// Only the challenged side may accept.
    pub fn accept(&mut self, side: Side) -> Result<(), GameRuleError> {
        self.ensure_pending()?;
        if side != Side::B {
            return Err(GameRuleError::WrongTurn(
                "the challenger cannot accept its own challenge".to_string(),
            ));
        }
        self.status = MatchStatus::Active;
        self.current_round = 1;
        self.open_round(1);
        Ok(())
    }

    /// Either side may decline a pending challenge; the caller withdraws it.
    pub fn check_decline(&self, _side: Side) -> Result<(), GameRuleError> {
        self.ensure_pending()
    }

    fn open_round(&mut self, round_number: u32) {
        let round = match self.master_category {
            Some(category) => {
                Round::with_fixed_category(round_number, self.questions_per_round, category)
            }
            None => Round::new(
                round_number,
                self.questions_per_round,
                Side::category_chooser(round_number),
            ),
        };
        self.rounds.push(round);
    }

    /// Round number and category of an opened fixed-category round that
    /// still needs its question batch.
    pub fn pending_fixed_batch(&self) -> Option<(u32, CategoryId)> {
        let round = self.active_round()?;
        match (round.state, round.chooser, round.category) {
            (RoundState::AwaitingCategory, None, Some(category)) => {
                Some((round.round_number, category))
            }
            _ => None,
        }
    }

    pub fn assign_fixed_batch(&mut self, questions: Vec<RoundQuestion>) -> Result<(), GameRuleError> {
        self.ensure_active()?;
        let current_round = self.current_round;
        self.round_mut(current_round)
            .ok_or_else(|| GameRuleError::InvalidState("no round is open".to_string()))?
            .assign_fixed_batch(questions)
    }

    pub fn check_category_selection(&self, side: Side, round_number: u32) -> Result<(), GameRuleError> {
        self.ensure_active()?;
        if round_number != self.current_round {
            return Err(GameRuleError::InvalidState(format!(
                "round {} is not the current round",
                round_number
            )));
        }
        self.active_round()
            .ok_or_else(|| GameRuleError::InvalidState("no round is open".to_string()))?
            .check_category_selection(side)
    }

    pub fn select_category(
        &mut self,
        side: Side,
        round_number: u32,
        category: CategoryId,
        questions: Vec<RoundQuestion>,
    ) -> Result<(), GameRuleError> {
        self.check_category_selection(side, round_number)?;
        self.round_mut(round_number)
            .ok_or_else(|| GameRuleError::InvalidState("no round is open".to_string()))?
            .select_category(side, category, questions)
    }

    pub fn submit_answers(
        &mut self,
        side: Side,
        round_number: u32,
        answers: &[SubmittedAnswer],
    ) -> Result<Option<RoundResult>, GameRuleError> {
        self.ensure_active()?;
        self.round_mut(round_number)
            .ok_or_else(|| {
                GameRuleError::InvalidState(format!("round {} has not been opened", round_number))
            })?
            .submit_answers(side, answers)
    }

    /// Folds a completed round into the running score and either opens the
    /// next round or finalizes the match. Safe to call repeatedly for the
    /// same round: repeats are reported as `AlreadyApplied`, or rejected with
    /// `MatchFinalized` once the match is over.
    pub fn advance_after_round_complete(
        &mut self,
        round_number: u32,
    ) -> Result<AdvanceOutcome, GameRuleError> {
        self.ensure_active()?;
        if round_number < self.current_round {
            return Ok(AdvanceOutcome::AlreadyApplied);
        }
        let result = self
            .round(round_number)
            .and_then(Round::result)
            .ok_or_else(|| {
                GameRuleError::InvalidState(format!("round {} is not complete", round_number))
            })?;
        if round_number != self.current_round {
            return Err(GameRuleError::InvalidState(format!(
                "round {} is not the current round",
                round_number
            )));
        }

        self.scores.add(&result);

        if self.current_round >= self.total_rounds {
            let winner = self.scores.leader();
            self.finalize(winner);
            return Ok(AdvanceOutcome::Completed { winner });
        }

        self.current_round += 1;
        let next = self.current_round;
        self.open_round(next);
        Ok(AdvanceOutcome::NextRound { round_number: next })
    }

    /// Ends the match immediately in favour of the other side.
    pub fn surrender(&mut self, side: Side) -> Result<Winner, GameRuleError> {
        self.ensure_active()?;
        let winner = Winner::Side(side.other());
        self.surrendered_by = Some(side);
        self.finalize(winner);
        Ok(winner)
    }

    fn finalize(&mut self, winner: Winner) {
        self.status = MatchStatus::Completed;
        self.winner = Some(winner);
    }
}
