use crate::models::errors::GameRuleError;
use crate::repositories::errors::{
    match_repository_errors::MatchRepositoryError,
    question_repository_errors::QuestionRepositoryError,
};

#[derive(Debug)]
pub enum MatchServiceError {
    Rule(GameRuleError),
    MatchNotFound(String),
    NotParticipant { match_id: String, player_id: String },
    /// Another writer committed first; the caller may reload and retry.
    ConcurrentModification(String),
    RepositoryError(MatchRepositoryError),
    QuestionStore(QuestionRepositoryError),
}

impl std::fmt::Display for MatchServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchServiceError::Rule(err) => write!(f, "{}", err),
            MatchServiceError::MatchNotFound(match_id) => {
                write!(f, "Match {} not found", match_id)
            }
            MatchServiceError::NotParticipant {
                match_id,
                player_id,
            } => write!(
                f,
                "Player {} is not part of match {}",
                player_id, match_id
            ),
            MatchServiceError::ConcurrentModification(match_id) => write!(
                f,
                "Match {} was modified concurrently, reload and retry",
                match_id
            ),
            MatchServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
            MatchServiceError::QuestionStore(err) => write!(f, "Question store error: {}", err),
        }
    }
}

impl std::error::Error for MatchServiceError {}

impl From<GameRuleError> for MatchServiceError {
    fn from(err: GameRuleError) -> Self {
        MatchServiceError::Rule(err)
    }
}

impl From<MatchRepositoryError> for MatchServiceError {
    fn from(err: MatchRepositoryError) -> Self {
        MatchServiceError::RepositoryError(err)
    }
}

impl From<QuestionRepositoryError> for MatchServiceError {
    fn from(err: QuestionRepositoryError) -> Self {
        match err {
            QuestionRepositoryError::InsufficientPool { category_id, .. } => {
                MatchServiceError::Rule(GameRuleError::CategoryUnavailable(category_id))
            }
            other => MatchServiceError::QuestionStore(other),
        }
    }
}
