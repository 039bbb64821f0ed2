use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use engine::models::queue::{QueueEntry, QueueKind};
use lambda_http::tracing::{debug, error};
use serde::Serialize;

use crate::{
    error::ApiError, middleware::identity::PlayerIdentity, state::AppState, views::MatchView,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/queue/join", post(join_queue))
        .route("/queue/leave", post(leave_queue))
}

#[derive(Debug, Serialize)]
pub struct JoinQueueResponse {
    pub entry: QueueEntry,
    #[serde(rename = "match")]
    pub formed_match: Option<MatchView>,
}

async fn join_queue(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Json(payload): Json<QueueKind>,
) -> Result<Json<JoinQueueResponse>, ApiError> {
    let outcome = state
        .matchmaking_service
        .join(&identity.player_id, payload)
        .await
        .map_err(|e| {
            error!("Failed to join queue for player {}: {}", identity.player_id, e);
            ApiError::from(e)
        })?;

    debug!(
        "Player {} joined the {:?} queue",
        identity.player_id,
        outcome.entry.kind.mode()
    );
    Ok(Json(JoinQueueResponse {
        entry: outcome.entry,
        formed_match: outcome.formed_match.as_ref().map(MatchView::from),
    }))
}

async fn leave_queue(
    State(state): State<AppState>,
    identity: PlayerIdentity,
) -> Result<StatusCode, ApiError> {
    if state
        .matchmaking_service
        .leave(&identity.player_id)
        .await
        .is_some()
    {
        debug!("Player {} left the queue", identity.player_id);
    }
    Ok(StatusCode::NO_CONTENT)
}
