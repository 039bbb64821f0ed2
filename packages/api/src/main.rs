use api::state::AppState;
use engine::config::EngineConfig;
use lambda_http::{run, tracing::info, Error};
use std::env::set_var;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .init();

    let config = EngineConfig::from_env()?;
    let state = AppState::from_config(&config).await?;
    info!("Starting QuizRush API with {:?} storage", config.storage);

    run(api::app(state)).await
}
