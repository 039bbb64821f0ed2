use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use engine::models::account::Account;

use crate::{error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/accounts/{player_id}", get(get_account))
}

/// Public progression profile. Unknown players read as a fresh account.
async fn get_account(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
) -> Result<Json<Account>, ApiError> {
    let account = state.progression_service.get_account(&player_id).await?;
    Ok(Json(account))
}
