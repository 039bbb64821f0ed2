use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod views;

use state::AppState;

pub fn app(state: AppState) -> Router {
    // TODO: restrict origins once the web client has a fixed domain.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(routes::matches::routes())
        .merge(routes::queue::routes())
        .merge(routes::solo::routes())
        .merge(routes::accounts::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
