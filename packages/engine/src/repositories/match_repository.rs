use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_dynamo::{from_item, to_item};
use tokio::sync::Mutex;

#[cfg(test)]
use mockall::automock;

use crate::models::match_session::MatchSession;
use crate::repositories::errors::match_repository_errors::MatchRepositoryError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn create_match(&self, session: &MatchSession) -> Result<(), MatchRepositoryError>;

    async fn get_match(&self, match_id: &str) -> Result<MatchSession, MatchRepositoryError>;

    /// Stores `session` only if the stored copy is still at
    /// `expected_version`; otherwise `VersionConflict`.
    async fn save_match(
        &self,
        session: &MatchSession,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError>;

    async fn delete_match(
        &self,
        match_id: &str,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError>;
}

#[derive(Default)]
pub struct InMemoryMatchRepository {
    matches: Mutex<HashMap<String, MatchSession>>,
}

impl InMemoryMatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MatchRepository for InMemoryMatchRepository {
    async fn create_match(&self, session: &MatchSession) -> Result<(), MatchRepositoryError> {
        let mut matches = self.matches.lock().await;
        if matches.contains_key(&session.match_id) {
            return Err(MatchRepositoryError::AlreadyExists);
        }
        matches.insert(session.match_id.clone(), session.clone());
        Ok(())
    }

    async fn get_match(&self, match_id: &str) -> Result<MatchSession, MatchRepositoryError> {
        self.matches
            .lock()
            .await
            .get(match_id)
            .cloned()
            .ok_or(MatchRepositoryError::NotFound)
    }

    async fn save_match(
        &self,
        session: &MatchSession,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError> {
        let mut matches = self.matches.lock().await;
        let stored = matches
            .get_mut(&session.match_id)
            .ok_or(MatchRepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(MatchRepositoryError::VersionConflict {
                expected: expected_version,
            });
        }
        *stored = session.clone();
        Ok(())
    }

    async fn delete_match(
        &self,
        match_id: &str,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError> {
        let mut matches = self.matches.lock().await;
        match matches.get(match_id) {
            None => Err(MatchRepositoryError::NotFound),
            Some(stored) if stored.version != expected_version => {
                Err(MatchRepositoryError::VersionConflict {
                    expected: expected_version,
                })
            }
            Some(_) => {
                matches.remove(match_id);
                Ok(())
            }
        }
    }
}

pub struct DynamoDbMatchRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbMatchRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl MatchRepository for DynamoDbMatchRepository {
    async fn create_match(&self, session: &MatchSession) -> Result<(), MatchRepositoryError> {
        let item =
            to_item(session).map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(match_id)")
            .send()
            .await
            .map_err(|e| {
                let conflict = e
                    .as_service_error()
                    .map_or(false, |se| se.is_conditional_check_failed_exception());
                if conflict {
                    MatchRepositoryError::AlreadyExists
                } else {
                    MatchRepositoryError::DynamoDb(e.to_string())
                }
            })?;

        Ok(())
    }

    async fn get_match(&self, match_id: &str) -> Result<MatchSession, MatchRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("match_id", AttributeValue::S(match_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| MatchRepositoryError::DynamoDb(e.to_string()))?;

        match output.item {
            Some(item) => {
                from_item(item).map_err(|e| MatchRepositoryError::Serialization(e.to_string()))
            }
            None => Err(MatchRepositoryError::NotFound),
        }
    }

    async fn save_match(
        &self,
        session: &MatchSession,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError> {
        let item =
            to_item(session).map_err(|e| MatchRepositoryError::Serialization(e.to_string()))?;

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_exists(match_id) AND #version = :expected")
            .expression_attribute_names("#version", "version")
            .expression_attribute_values(
                ":expected",
                AttributeValue::N(expected_version.to_string()),
            )
            .send()
            .await
            .map_err(|e| {
                let conflict = e
                    .as_service_error()
                    .map_or(false, |se| se.is_conditional_check_failed_exception());
                if conflict {
                    MatchRepositoryError::VersionConflict {
                        expected: expected_version,
                    }
                } else {
                    MatchRepositoryError::DynamoDb(e.to_string())
                }
            })?;

        Ok(())
    }

    async fn delete_match(
        &self,
        match_id: &str,
        expected_version: u64,
    ) -> Result<(), MatchRepositoryError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("match_id", AttributeValue::S(match_id.to_string()))
            .condition_expression("#version = :expected")
            .expression_attribute_names("#version", "version")
            .expression_attribute_values(
                ":expected",
                AttributeValue::N(expected_version.to_string()),
            )
            .send()
            .await
            .map_err(|e| {
                let conflict = e
                    .as_service_error()
                    .map_or(false, |se| se.is_conditional_check_failed_exception());
                if conflict {
                    MatchRepositoryError::VersionConflict {
                        expected: expected_version,
                    }
                } else {
                    MatchRepositoryError::DynamoDb(e.to_string())
                }
            })?;

        Ok(())
    }
}
