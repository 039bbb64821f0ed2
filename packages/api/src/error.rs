use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engine::models::errors::GameRuleError;
use engine::services::errors::{
    match_service_errors::MatchServiceError,
    matchmaking_service_errors::MatchmakingServiceError,
    progression_service_errors::ProgressionServiceError,
};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    MatchService(MatchServiceError),
    MatchmakingService(MatchmakingServiceError),
    ProgressionService(ProgressionServiceError),
    MissingIdentity,
    BadRequest(String),
}

impl From<MatchServiceError> for ApiError {
    fn from(error: MatchServiceError) -> Self {
        ApiError::MatchService(error)
    }
}

impl From<MatchmakingServiceError> for ApiError {
    fn from(error: MatchmakingServiceError) -> Self {
        ApiError::MatchmakingService(error)
    }
}

impl From<ProgressionServiceError> for ApiError {
    fn from(error: ProgressionServiceError) -> Self {
        ApiError::ProgressionService(error)
    }
}

fn rule_status(error: &GameRuleError) -> StatusCode {
    match error {
        GameRuleError::InvalidState(_)
        | GameRuleError::WrongTurn(_)
        | GameRuleError::DuplicateSubmission { .. }
        | GameRuleError::AlreadyQueued(_)
        | GameRuleError::MatchFinalized => StatusCode::CONFLICT,
        GameRuleError::CategoryUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GameRuleError::AnswerCountMismatch { .. }
        | GameRuleError::InvalidOption { .. }
        | GameRuleError::InvalidSettings(_) => StatusCode::BAD_REQUEST,
    }
}

fn match_status(error: &MatchServiceError) -> StatusCode {
    match error {
        MatchServiceError::Rule(rule) => rule_status(rule),
        MatchServiceError::MatchNotFound(_) => StatusCode::NOT_FOUND,
        MatchServiceError::NotParticipant { .. } => StatusCode::FORBIDDEN,
        MatchServiceError::ConcurrentModification(_) => StatusCode::CONFLICT,
        MatchServiceError::RepositoryError(_) | MatchServiceError::QuestionStore(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MatchService(err) => match_status(err),
            ApiError::MatchmakingService(MatchmakingServiceError::Rule(rule)) => rule_status(rule),
            ApiError::MatchmakingService(MatchmakingServiceError::MatchCreation(inner)) => {
                match_status(inner)
            }
            ApiError::MatchmakingService(MatchmakingServiceError::AccountLookup(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ProgressionService(ProgressionServiceError::Rule(rule)) => rule_status(rule),
            ApiError::ProgressionService(
                ProgressionServiceError::RepositoryError(_)
                | ProgressionServiceError::AwardIncomplete { .. },
            ) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MissingIdentity => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::MatchService(err) => write!(f, "{}", err),
            ApiError::MatchmakingService(err) => write!(f, "{}", err),
            ApiError::ProgressionService(err) => write!(f, "{}", err),
            ApiError::MissingIdentity => write!(f, "Missing or invalid x-player-id header"),
            ApiError::BadRequest(msg) => write!(f, "{}", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage details stay in the logs.
        let message = if status.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
