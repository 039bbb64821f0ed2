use crate::models::errors::GameRuleError;
use crate::repositories::errors::account_repository_errors::AccountRepositoryError;

#[derive(Debug)]
pub enum ProgressionServiceError {
    Rule(GameRuleError),
    RepositoryError(AccountRepositoryError),
    /// Some players of a completed match could not be credited. Everyone
    /// else was.
    AwardIncomplete {
        match_id: String,
        failures: Vec<(String, AccountRepositoryError)>,
    },
}

impl std::fmt::Display for ProgressionServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressionServiceError::Rule(err) => write!(f, "{}", err),
            ProgressionServiceError::RepositoryError(err) => {
                write!(f, "Repository error: {}", err)
            }
            ProgressionServiceError::AwardIncomplete { match_id, failures } => {
                write!(f, "Rewards for match {} failed for", match_id)?;
                for (player_id, err) in failures {
                    write!(f, " {} ({})", player_id, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ProgressionServiceError {}

impl From<GameRuleError> for ProgressionServiceError {
    fn from(err: GameRuleError) -> Self {
        ProgressionServiceError::Rule(err)
    }
}

impl From<AccountRepositoryError> for ProgressionServiceError {
    fn from(err: AccountRepositoryError) -> Self {
        ProgressionServiceError::RepositoryError(err)
    }
}
