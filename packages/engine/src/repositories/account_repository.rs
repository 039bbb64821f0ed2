use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::{from_item, to_item};
use tokio::sync::Mutex;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

use crate::models::{
    account::{Account, AccountChange, AccountUpdate},
    achievement::AchievementCatalog,
};
use crate::repositories::errors::account_repository_errors::AccountRepositoryError;

const MAX_UPDATE_ATTEMPTS: u32 = 5;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Returns the stored account, or a fresh level-1 account for players
    /// that have never been rewarded.
    async fn get_account(&self, player_id: &str) -> Result<Account, AccountRepositoryError>;

    /// Applies `update` and evaluates `catalog` as one atomic step, so
    /// concurrent sessions of the same player never lose an update.
    async fn update_account(
        &self,
        player_id: &str,
        update: &AccountUpdate,
        catalog: &AchievementCatalog,
    ) -> Result<AccountChange, AccountRepositoryError>;
}

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: Mutex<HashMap<String, Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn get_account(&self, player_id: &str) -> Result<Account, AccountRepositoryError> {
        Ok(self
            .accounts
            .lock()
            .await
            .get(player_id)
            .cloned()
            .unwrap_or_else(|| Account::new(player_id)))
    }

    async fn update_account(
        &self,
        player_id: &str,
        update: &AccountUpdate,
        catalog: &AchievementCatalog,
    ) -> Result<AccountChange, AccountRepositoryError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .entry(player_id.to_string())
            .or_insert_with(|| Account::new(player_id));
        Ok(account.apply(update, catalog))
    }
}

/// Accounts table keyed by `player_id`. Updates are read-modify-write cycles
/// guarded by a condition on `version`, retried on conflict.
pub struct DynamoDbAccountRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbAccountRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    async fn read(&self, player_id: &str) -> Result<Option<Account>, AccountRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("player_id", AttributeValue::S(player_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| AccountRepositoryError::DynamoDb(e.to_string()))?;

        output
            .item
            .map(|item| {
                from_item(item).map_err(|e| AccountRepositoryError::Serialization(e.to_string()))
            })
            .transpose()
    }
}

#[async_trait]
impl AccountRepository for DynamoDbAccountRepository {
    async fn get_account(&self, player_id: &str) -> Result<Account, AccountRepositoryError> {
        Ok(self
            .read(player_id)
            .await?
            .unwrap_or_else(|| Account::new(player_id)))
    }

    async fn update_account(
        &self,
        player_id: &str,
        update: &AccountUpdate,
        catalog: &AchievementCatalog,
    ) -> Result<AccountChange, AccountRepositoryError> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut account = self
                .read(player_id)
                .await?
                .unwrap_or_else(|| Account::new(player_id));
            let expected_version = account.version;
            let change = account.apply(update, catalog);

            let item = to_item(&change.account)
                .map_err(|e| AccountRepositoryError::Serialization(e.to_string()))?;
            let result = self
                .client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(player_id) OR #version = :expected")
                .expression_attribute_names("#version", "version")
                .expression_attribute_values(
                    ":expected",
                    AttributeValue::N(expected_version.to_string()),
                )
                .send()
                .await;

            match result {
                Ok(_) => return Ok(change),
                Err(e)
                    if e
                        .as_service_error()
                        .map_or(false, |se| se.is_conditional_check_failed_exception()) =>
                {
                    warn!(
                        "Account {} changed concurrently, retrying update (attempt {})",
                        player_id, attempt
                    );
                }
                Err(e) => return Err(AccountRepositoryError::DynamoDb(e.to_string())),
            }
        }

        Err(AccountRepositoryError::Contention {
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }
}
