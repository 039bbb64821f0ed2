use crate::models::errors::GameRuleError;
use crate::repositories::errors::account_repository_errors::AccountRepositoryError;
use crate::services::errors::match_service_errors::MatchServiceError;

#[derive(Debug)]
pub enum MatchmakingServiceError {
    Rule(GameRuleError),
    MatchCreation(MatchServiceError),
    AccountLookup(AccountRepositoryError),
}

impl std::fmt::Display for MatchmakingServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchmakingServiceError::Rule(err) => write!(f, "{}", err),
            MatchmakingServiceError::MatchCreation(err) => {
                write!(f, "Failed to create match: {}", err)
            }
            MatchmakingServiceError::AccountLookup(err) => {
                write!(f, "Failed to read account: {}", err)
            }
        }
    }
}

impl std::error::Error for MatchmakingServiceError {}

impl From<GameRuleError> for MatchmakingServiceError {
    fn from(err: GameRuleError) -> Self {
        MatchmakingServiceError::Rule(err)
    }
}

impl From<MatchServiceError> for MatchmakingServiceError {
    fn from(err: MatchServiceError) -> Self {
        MatchmakingServiceError::MatchCreation(err)
    }
}

impl From<AccountRepositoryError> for MatchmakingServiceError {
    fn from(err: AccountRepositoryError) -> Self {
        MatchmakingServiceError::AccountLookup(err)
    }
}
