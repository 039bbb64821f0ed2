use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::ApiError, state::AppState};

pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Caller identity, as asserted by the gateway in front of this API.
#[derive(Debug, Clone)]
pub struct PlayerIdentity {
    pub player_id: String,
}

impl FromRequestParts<AppState> for PlayerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let player_id = parts
            .headers
            .get(PLAYER_ID_HEADER)
            .ok_or(ApiError::MissingIdentity)?
            .to_str()
            .map_err(|_| ApiError::MissingIdentity)?
            .trim();

        if player_id.is_empty() {
            return Err(ApiError::MissingIdentity);
        }

        Ok(PlayerIdentity {
            player_id: player_id.to_string(),
        })
    }
}
