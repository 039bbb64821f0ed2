use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use engine::models::{
    match_session::{AdvanceOutcome, MatchSession, MatchSettings},
    round::SubmittedAnswer,
    CategoryId,
};
use engine::services::errors::match_service_errors::MatchServiceError;
use lambda_http::tracing::{debug, error};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError, middleware::identity::PlayerIdentity, state::AppState, views::MatchView,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/matches", post(create_match))
        .route("/matches/{match_id}", get(get_match))
        .route("/matches/{match_id}/accept", post(accept_challenge))
        .route("/matches/{match_id}/decline", post(decline_challenge))
        .route("/matches/{match_id}/surrender", post(surrender))
        .route(
            "/matches/{match_id}/rounds/{round_number}/category",
            post(select_category),
        )
        .route(
            "/matches/{match_id}/rounds/{round_number}/answers",
            post(submit_answers),
        )
        .route(
            "/matches/{match_id}/rounds/{round_number}/advance",
            post(advance_round),
        )
}

/// The caller always plays on side A, joined by `partner` in squad mode.
#[derive(Debug, Deserialize)]
pub struct CreateMatchRequest {
    #[serde(flatten)]
    pub settings: MatchSettings,
    pub opponents: Vec<String>,
    #[serde(default)]
    pub partner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectCategoryRequest {
    pub category_id: CategoryId,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    #[serde(flatten)]
    pub outcome: AdvanceOutcome,
    #[serde(rename = "match")]
    pub session: MatchView,
}

fn ensure_participant(session: &MatchSession, player_id: &str) -> Result<(), ApiError> {
    if session.side_of(player_id).is_none() {
        return Err(ApiError::from(MatchServiceError::NotParticipant {
            match_id: session.match_id.clone(),
            player_id: player_id.to_string(),
        }));
    }
    Ok(())
}

fn log_failure(action: &str, match_id: &str, player_id: &str, e: MatchServiceError) -> ApiError {
    error!(
        "Failed to {} in match {} for player {}: {}",
        action, match_id, player_id, e
    );
    ApiError::from(e)
}

async fn create_match(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Json(payload): Json<CreateMatchRequest>,
) -> Result<(StatusCode, Json<MatchView>), ApiError> {
    let mut side_a = vec![identity.player_id.clone()];
    side_a.extend(payload.partner);

    let session = state
        .match_service
        .create_match(&payload.settings, side_a, payload.opponents)
        .await
        .map_err(|e| {
            error!("Failed to create match for player {}: {}", identity.player_id, e);
            ApiError::from(e)
        })?;

    debug!(
        "Player {} issued a {:?} challenge {}",
        identity.player_id, session.mode, session.match_id
    );
    Ok((StatusCode::CREATED, Json(MatchView::from(&session))))
}

async fn get_match(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Path(match_id): Path<String>,
) -> Result<Json<MatchView>, ApiError> {
    let session = state.match_service.get_match(&match_id).await?;
    ensure_participant(&session, &identity.player_id)?;
    Ok(Json(MatchView::from(&session)))
}

async fn accept_challenge(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Path(match_id): Path<String>,
) -> Result<Json<MatchView>, ApiError> {
    let session = state
        .match_service
        .accept_challenge(&match_id, &identity.player_id)
        .await
        .map_err(|e| log_failure("accept", &match_id, &identity.player_id, e))?;

    debug!("Player {} accepted match {}", identity.player_id, match_id);
    Ok(Json(MatchView::from(&session)))
}

async fn decline_challenge(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Path(match_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .match_service
        .decline_challenge(&match_id, &identity.player_id)
        .await
        .map_err(|e| log_failure("decline", &match_id, &identity.player_id, e))?;

    debug!("Player {} declined match {}", identity.player_id, match_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn surrender(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Path(match_id): Path<String>,
) -> Result<Json<MatchView>, ApiError> {
    let session = state
        .match_service
        .surrender(&match_id, &identity.player_id)
        .await
        .map_err(|e| log_failure("surrender", &match_id, &identity.player_id, e))?;

    debug!("Player {} surrendered match {}", identity.player_id, match_id);
    Ok(Json(MatchView::from(&session)))
}

async fn select_category(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Path((match_id, round_number)): Path<(String, u32)>,
    Json(payload): Json<SelectCategoryRequest>,
) -> Result<Json<MatchView>, ApiError> {
    let session = state
        .match_service
        .select_category(
            &match_id,
            &identity.player_id,
            round_number,
            payload.category_id,
        )
        .await
        .map_err(|e| log_failure("select a category", &match_id, &identity.player_id, e))?;

    debug!(
        "Player {} picked category {} for round {} of match {}",
        identity.player_id, payload.category_id, round_number, match_id
    );
    Ok(Json(MatchView::from(&session)))
}

async fn submit_answers(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Path((match_id, round_number)): Path<(String, u32)>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<Json<MatchView>, ApiError> {
    let session = state
        .match_service
        .submit_answers(
            &match_id,
            &identity.player_id,
            round_number,
            &payload.answers,
        )
        .await
        .map_err(|e| log_failure("submit answers", &match_id, &identity.player_id, e))?;

    debug!(
        "Player {} answered round {} of match {}",
        identity.player_id, round_number, match_id
    );
    Ok(Json(MatchView::from(&session)))
}

async fn advance_round(
    State(state): State<AppState>,
    identity: PlayerIdentity,
    Path((match_id, round_number)): Path<(String, u32)>,
) -> Result<Json<AdvanceResponse>, ApiError> {
    let current = state.match_service.get_match(&match_id).await?;
    ensure_participant(&current, &identity.player_id)?;

    let (outcome, session) = state
        .match_service
        .advance_after_round_complete(&match_id, round_number)
        .await
        .map_err(|e| log_failure("advance", &match_id, &identity.player_id, e))?;

    Ok(Json(AdvanceResponse {
        outcome,
        session: MatchView::from(&session),
    }))
}
