use std::sync::Arc;

use engine::config::{EngineConfig, StorageBackend};
use engine::models::{achievement::AchievementCatalog, question::Question, queue::PairingPolicy, rewards::RewardTable};
use engine::repositories::{
    account_repository::{AccountRepository, DynamoDbAccountRepository, InMemoryAccountRepository},
    errors::question_repository_errors::QuestionRepositoryError,
    match_repository::{DynamoDbMatchRepository, InMemoryMatchRepository, MatchRepository},
    notification_repository::{ApiGatewayEventPublisher, MatchEventPublisher, TracingEventPublisher},
    question_repository::{
        DynamoDbQuestionRepository, InMemoryQuestionRepository, QuestionRepository,
    },
};
use engine::services::{
    match_service::MatchService, matchmaking_service::MatchmakingService,
    progression_service::ProgressionService, scoring_service::ScoringService,
};
use lambda_http::tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub match_service: Arc<MatchService>,
    pub matchmaking_service: Arc<MatchmakingService>,
    pub progression_service: Arc<ProgressionService>,
}

struct Stores {
    matches: Arc<dyn MatchRepository + Send + Sync>,
    accounts: Arc<dyn AccountRepository + Send + Sync>,
    questions: Arc<dyn QuestionRepository + Send + Sync>,
    publisher: Arc<dyn MatchEventPublisher + Send + Sync>,
}

impl AppState {
    /// Wires the services onto the storage backend named by `config`.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, QuestionRepositoryError> {
        let stores = match (config.storage, &config.tables) {
            (StorageBackend::DynamoDb, Some(tables)) => {
                let sdk_config = aws_config::load_from_env().await;
                let client = aws_sdk_dynamodb::Client::new(&sdk_config);

                let publisher: Arc<dyn MatchEventPublisher + Send + Sync> =
                    match &config.websocket_endpoint {
                        Some(endpoint) => Arc::new(ApiGatewayEventPublisher::new(
                            &sdk_config,
                            endpoint,
                            &tables.player_connections,
                        )),
                        None => {
                            warn!("WEBSOCKET_API_ENDPOINT not set, match events are only logged");
                            Arc::new(TracingEventPublisher)
                        }
                    };

                info!("Using DynamoDB storage");
                Stores {
                    matches: Arc::new(DynamoDbMatchRepository::new(client.clone(), &tables.matches)),
                    accounts: Arc::new(DynamoDbAccountRepository::new(
                        client.clone(),
                        &tables.accounts,
                    )),
                    questions: Arc::new(DynamoDbQuestionRepository::new(client, &tables.questions)),
                    publisher,
                }
            }
            _ => {
                let questions = match &config.question_bank_path {
                    Some(path) => InMemoryQuestionRepository::from_json_file(path)?,
                    None => {
                        warn!("QUESTION_BANK_PATH not set, starting with an empty question bank");
                        InMemoryQuestionRepository::new(vec![])
                    }
                };

                info!("Using in-memory storage");
                Stores {
                    matches: Arc::new(InMemoryMatchRepository::new()),
                    accounts: Arc::new(InMemoryAccountRepository::new()),
                    questions: Arc::new(questions),
                    publisher: Arc::new(TracingEventPublisher),
                }
            }
        };

        let policy = PairingPolicy {
            max_level_gap: config.max_level_gap,
        };
        Ok(Self::build(stores, config.rewards.clone(), policy))
    }

    /// Fully in-memory state over a fixed question bank.
    pub fn in_memory(questions: Vec<Question>, rewards: RewardTable, policy: PairingPolicy) -> Self {
        Self::build(
            Stores {
                matches: Arc::new(InMemoryMatchRepository::new()),
                accounts: Arc::new(InMemoryAccountRepository::new()),
                questions: Arc::new(InMemoryQuestionRepository::new(questions)),
                publisher: Arc::new(TracingEventPublisher),
            },
            rewards,
            policy,
        )
    }

    fn build(stores: Stores, rewards: RewardTable, policy: PairingPolicy) -> Self {
        let progression_service = ProgressionService::new(
            stores.accounts.clone(),
            ScoringService::new(rewards),
            AchievementCatalog::default(),
        );
        let match_service = MatchService::new(
            stores.matches,
            stores.questions,
            stores.publisher,
            progression_service.clone(),
        );
        let matchmaking_service =
            MatchmakingService::new(match_service.clone(), stores.accounts, policy);

        AppState {
            match_service: Arc::new(match_service),
            matchmaking_service: Arc::new(matchmaking_service),
            progression_service: Arc::new(progression_service),
        }
    }
}
