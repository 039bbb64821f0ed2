use axum::{extract::State, routing::post, Json, Router};
use engine::models::{account::AccountChange, blitz::BlitzSession};
use lambda_http::tracing::{debug, error};

use crate::{error::ApiError, middleware::identity::PlayerIdentity, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/solo/blitz", post(complete_blitz))
}

async fn complete_blitz(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Json(payload): Json<BlitzSession>,
) -> Result<Json<AccountChange>, ApiError> {
    let change = state
        .progression_service
        .award_blitz(&identity.player_id, &payload)
        .await
        .map_err(|e| {
            error!("Failed to record blitz run for player {}: {}", identity.player_id, e);
            ApiError::from(e)
        })?;

    debug!(
        "Player {} finished a blitz run with score {}",
        identity.player_id, payload.score
    );
    Ok(Json(change))
}
