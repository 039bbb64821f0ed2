use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::{primitives::Blob, Client as ApiGatewayClient};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

use crate::models::events::MatchEvent;
use crate::repositories::errors::notification_errors::NotificationError;

/// Outbound channel informing participants about match changes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MatchEventPublisher: Send + Sync {
    async fn publish(&self, event: &MatchEvent) -> Result<(), NotificationError>;
}

/// Writes every event to the log and delivers nothing.
#[derive(Debug, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl MatchEventPublisher for TracingEventPublisher {
    async fn publish(&self, event: &MatchEvent) -> Result<(), NotificationError> {
        info!(
            "Match {} event {} for {:?}",
            event.match_id,
            event.name(),
            event.recipients
        );
        Ok(())
    }
}

/// Keeps published events so callers can inspect them.
#[derive(Debug, Default)]
pub struct InMemoryEventPublisher {
    events: Mutex<Vec<MatchEvent>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<MatchEvent> {
        self.events.lock().await.clone()
    }

    pub async fn events_for(&self, match_id: &str) -> Vec<MatchEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| event.match_id == match_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MatchEventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &MatchEvent) -> Result<(), NotificationError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Pushes events to connected players through the API Gateway WebSocket
/// management API. Connection ids live in the player connections table,
/// keyed by `player_id`.
pub struct ApiGatewayEventPublisher {
    dynamodb_client: DynamoDbClient,
    api_gateway_client: ApiGatewayClient,
    connections_table: String,
}

impl ApiGatewayEventPublisher {
    pub fn new(
        sdk_config: &aws_config::SdkConfig,
        endpoint: &str,
        connections_table: &str,
    ) -> Self {
        let api_gateway_config = aws_sdk_apigatewaymanagement::config::Builder::from(sdk_config)
            .endpoint_url(endpoint)
            .build();

        Self {
            dynamodb_client: DynamoDbClient::new(sdk_config),
            api_gateway_client: ApiGatewayClient::from_conf(api_gateway_config),
            connections_table: connections_table.to_string(),
        }
    }

    async fn connection_id(&self, player_id: &str) -> Result<Option<String>, NotificationError> {
        let output = self
            .dynamodb_client
            .get_item()
            .table_name(&self.connections_table)
            .key("player_id", AttributeValue::S(player_id.to_string()))
            .send()
            .await
            .map_err(|e| NotificationError::DynamoDb(e.to_string()))?;

        Ok(output
            .item
            .and_then(|item| match item.get("connection_id") {
                Some(AttributeValue::S(connection_id)) => Some(connection_id.clone()),
                _ => None,
            }))
    }
}

#[async_trait]
impl MatchEventPublisher for ApiGatewayEventPublisher {
    async fn publish(&self, event: &MatchEvent) -> Result<(), NotificationError> {
        let message = serde_json::to_string(event)
            .map_err(|e| NotificationError::Serialization(e.to_string()))?;
        let mut failures = Vec::new();

        for player_id in &event.recipients {
            let connection_id = match self.connection_id(player_id).await? {
                Some(connection_id) => connection_id,
                None => {
                    info!("Player {} is not connected, skipping {}", player_id, event.name());
                    continue;
                }
            };

            let result = self
                .api_gateway_client
                .post_to_connection()
                .connection_id(&connection_id)
                .data(Blob::new(message.as_bytes()))
                .send()
                .await;

            match result {
                Ok(_) => info!("Sent {} to player {}", event.name(), player_id),
                Err(e) if e.as_service_error().map_or(false, |se| se.is_gone_exception()) => {
                    warn!(
                        "Connection {} for player {} is gone",
                        connection_id, player_id
                    );
                }
                Err(e) => failures.push(format!("{}: {}", player_id, e)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::Delivery(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::MatchEventKind;

    fn event(match_id: &str) -> MatchEvent {
        MatchEvent {
            match_id: match_id.to_string(),
            recipients: vec!["alice".to_string()],
            kind: MatchEventKind::ChallengeIssued,
        }
    }

    #[tokio::test]
    async fn test_in_memory_publisher_records_events() {
        let publisher = InMemoryEventPublisher::new();

        publisher.publish(&event("m1")).await.unwrap();
        publisher.publish(&event("m2")).await.unwrap();

        assert_eq!(publisher.events().await.len(), 2);
        assert_eq!(publisher.events_for("m2").await, vec![event("m2")]);
    }

    #[tokio::test]
    async fn test_tracing_publisher_never_fails() {
        assert!(TracingEventPublisher.publish(&event("m1")).await.is_ok());
    }
}
