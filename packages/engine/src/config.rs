use std::path::PathBuf;

use crate::models::rewards::RewardTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    DynamoDb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoDbTables {
    pub matches: String,
    pub accounts: String,
    pub questions: String,
    pub player_connections: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub storage: StorageBackend,
    /// Present when `storage` is DynamoDB.
    pub tables: Option<DynamoDbTables>,
    pub websocket_endpoint: Option<String>,
    pub question_bank_path: Option<PathBuf>,
    pub rewards: RewardTable,
    pub max_level_gap: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue { variable: String, message: String },
    InvalidRewardTable(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(name) => {
                write!(f, "{} environment variable must be set", name)
            }
            ConfigError::InvalidValue { variable, message } => {
                write!(f, "Invalid value for {}: {}", variable, message)
            }
            ConfigError::InvalidRewardTable(msg) => write!(f, "Invalid reward table: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = match lookup("QUIZRUSH_STORAGE").as_deref() {
            None | Some("memory") => StorageBackend::Memory,
            Some("dynamodb") => StorageBackend::DynamoDb,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    variable: "QUIZRUSH_STORAGE".to_string(),
                    message: format!("expected memory or dynamodb, got {}", other),
                })
            }
        };

        let required = |name: &str| {
            lookup(name).ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
        };
        let tables = match storage {
            StorageBackend::Memory => None,
            StorageBackend::DynamoDb => Some(DynamoDbTables {
                matches: required("MATCHES_TABLE")?,
                accounts: required("ACCOUNTS_TABLE")?,
                questions: required("QUESTIONS_TABLE")?,
                player_connections: required("PLAYER_CONNECTIONS_TABLE")?,
            }),
        };

        let rewards = match lookup("QUIZRUSH_REWARD_TABLE") {
            Some(json) => {
                let table: RewardTable = serde_json::from_str(&json)
                    .map_err(|e| ConfigError::InvalidRewardTable(e.to_string()))?;
                table.validate().map_err(ConfigError::InvalidRewardTable)?;
                table
            }
            None => RewardTable::default(),
        };

        let max_level_gap = lookup("QUIZRUSH_MAX_LEVEL_GAP")
            .map(|value| {
                value.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                    variable: "QUIZRUSH_MAX_LEVEL_GAP".to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        Ok(EngineConfig {
            storage,
            tables,
            websocket_endpoint: lookup("WEBSOCKET_API_ENDPOINT"),
            question_bank_path: lookup("QUESTION_BANK_PATH").map(PathBuf::from),
            rewards,
            max_level_gap,
        })
    }
}
