use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::{
    models::{
        match_session::MatchSession,
        queue::{find_pairing, MatchmakingQueue, PairingPolicy, QueueEntry, QueueKind},
    },
    repositories::account_repository::AccountRepository,
    services::{
        errors::matchmaking_service_errors::MatchmakingServiceError, match_service::MatchService,
    },
};

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub entry: QueueEntry,
    /// Set when joining immediately produced a pairing.
    pub formed_match: Option<MatchSession>,
}

/// Shared waiting list. `join`, `leave` and `try_match` are serialized by
/// one queue lock, so a player can never be booked into two matches.
#[derive(Clone)]
pub struct MatchmakingService {
    queue: Arc<Mutex<MatchmakingQueue>>,
    matches: MatchService,
    accounts: Arc<dyn AccountRepository + Send + Sync>,
    policy: PairingPolicy,
}

impl MatchmakingService {
    pub fn new(
        matches: MatchService,
        accounts: Arc<dyn AccountRepository + Send + Sync>,
        policy: PairingPolicy,
    ) -> Self {
        MatchmakingService {
            queue: Arc::new(Mutex::new(MatchmakingQueue::new())),
            matches,
            accounts,
            policy,
        }
    }

    /// Queues `player_id` with their current level and flash points, then
    /// tries to form a match. If forming the match fails the new entry is
    /// withdrawn and the error returned.
    pub async fn join(
        &self,
        player_id: &str,
        kind: QueueKind,
    ) -> Result<JoinOutcome, MatchmakingServiceError> {
        let account = self.accounts.get_account(player_id).await?;

        let mut queue = self.queue.lock().await;
        let entry = queue.join(player_id, kind, account.level, account.flash_points)?;
        info!(
            "Player {} joined the {:?} queue at level {}",
            player_id,
            entry.kind.mode(),
            entry.level
        );
        let formed_match = match self.try_match_locked(&mut queue).await {
            Ok(formed_match) => formed_match,
            Err(e) => {
                // A rejected join leaves the queue as it was.
                queue.leave(player_id);
                return Err(e);
            }
        };
        Ok(JoinOutcome {
            entry,
            formed_match,
        })
    }

    /// Removes the player's entry. Leaving when not queued is not an error.
    pub async fn leave(&self, player_id: &str) -> Option<QueueEntry> {
        let removed = self.queue.lock().await.leave(player_id);
        if removed.is_some() {
            info!("Player {} left the queue", player_id);
        }
        removed
    }

    pub async fn try_match(&self) -> Result<Option<MatchSession>, MatchmakingServiceError> {
        let mut queue = self.queue.lock().await;
        self.try_match_locked(&mut queue).await
    }

    pub async fn snapshot(&self) -> Vec<QueueEntry> {
        self.queue.lock().await.snapshot()
    }

    /// Creates the match first and only then consumes both entries, so a
    /// failed creation leaves the queue untouched.
    async fn try_match_locked(
        &self,
        queue: &mut MatchmakingQueue,
    ) -> Result<Option<MatchSession>, MatchmakingServiceError> {
        let pairing = match find_pairing(&queue.snapshot(), &self.policy) {
            Some(pairing) => pairing,
            None => return Ok(None),
        };

        let session = self
            .matches
            .create_match(&pairing.settings(), pairing.side_a(), pairing.side_b())
            .await
            .map_err(|e| {
                error!(
                    "Could not create a match for {} and {}: {}",
                    pairing.first.player_id, pairing.second.player_id, e
                );
                MatchmakingServiceError::from(e)
            })?;

        queue.remove_pair(&pairing);
        info!(
            "Paired {} with {} into match {}",
            pairing.first.player_id, pairing.second.player_id, session.match_id
        );
        Ok(Some(session))
    }
}
