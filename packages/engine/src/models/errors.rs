use crate::models::CategoryId;

/// Rejections raised by the round, match and queue rules.
///
/// Every variant is returned before any state is touched, so a rejected call
/// leaves the match, round or queue exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameRuleError {
    InvalidState(String),
    WrongTurn(String),
    DuplicateSubmission { round: u32 },
    AnswerCountMismatch { expected: usize, received: usize },
    InvalidOption { question: usize, option: usize },
    CategoryUnavailable(CategoryId),
    AlreadyQueued(String),
    MatchFinalized,
    InvalidSettings(String),
}

impl std::fmt::Display for GameRuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameRuleError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            GameRuleError::WrongTurn(msg) => write!(f, "Wrong turn: {}", msg),
            GameRuleError::DuplicateSubmission { round } => {
                write!(f, "Answers already submitted for round {}", round)
            }
            GameRuleError::AnswerCountMismatch { expected, received } => write!(
                f,
                "Expected {} answers but received {}",
                expected, received
            ),
            GameRuleError::InvalidOption { question, option } => write!(
                f,
                "Option {} does not exist for question {}",
                option, question
            ),
            GameRuleError::CategoryUnavailable(category_id) => write!(
                f,
                "Category {} does not have enough eligible questions",
                category_id
            ),
            GameRuleError::AlreadyQueued(player_id) => {
                write!(f, "Player {} is already queued", player_id)
            }
            GameRuleError::MatchFinalized => write!(f, "Match is already completed"),
            GameRuleError::InvalidSettings(msg) => write!(f, "Invalid match settings: {}", msg),
        }
    }
}

impl std::error::Error for GameRuleError {}
