use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    errors::GameRuleError,
    match_session::{MatchMode, MatchSettings},
    CategoryId,
};

/// What a queued player is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueueKind {
    Duel,
    Master { category: CategoryId },
    /// A duo: the joining player brings `partner_id` along.
    Squad { partner_id: String },
}

impl QueueKind {
    pub fn mode(&self) -> MatchMode {
        match self {
            QueueKind::Duel => MatchMode::Duel,
            QueueKind::Master { .. } => MatchMode::Master,
            QueueKind::Squad { .. } => MatchMode::Squad,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub player_id: String,
    pub kind: QueueKind,
    pub level: u32,
    pub flash_points: i64,
    pub created_at: DateTime<Utc>,
    /// Join order; breaks ties between entries created in the same instant.
    pub sequence: u64,
}

impl QueueEntry {
    /// Every player this entry would bring into a match.
    pub fn members(&self) -> Vec<&str> {
        match &self.kind {
            QueueKind::Squad { partner_id } => vec![self.player_id.as_str(), partner_id.as_str()],
            _ => vec![self.player_id.as_str()],
        }
    }

    pub fn includes(&self, player_id: &str) -> bool {
        self.members().contains(&player_id)
    }

    fn fifo_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.sequence)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingPolicy {
    /// Largest level difference allowed between two paired entries.
    pub max_level_gap: Option<u32>,
}

impl PairingPolicy {
    pub fn compatible(&self, first: &QueueEntry, second: &QueueEntry) -> bool {
        if let Some(gap) = self.max_level_gap {
            if first.level.abs_diff(second.level) > gap {
                return false;
            }
        }
        if first.members().iter().any(|id| second.includes(id)) {
            return false;
        }
        match (&first.kind, &second.kind) {
            (QueueKind::Duel, QueueKind::Duel) => true,
            (QueueKind::Master { category: a }, QueueKind::Master { category: b }) => a == b,
            (QueueKind::Squad { .. }, QueueKind::Squad { .. }) => true,
            _ => false,
        }
    }
}

/// Two entries chosen to face each other. The older entry becomes side A.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub first: QueueEntry,
    pub second: QueueEntry,
}

impl Pairing {
    pub fn settings(&self) -> MatchSettings {
        match &self.first.kind {
            QueueKind::Duel => MatchSettings::duel(),
            QueueKind::Master { category } => MatchSettings::master(*category),
            QueueKind::Squad { .. } => MatchSettings::squad(),
        }
    }

    pub fn side_a(&self) -> Vec<String> {
        self.first.members().iter().map(|id| id.to_string()).collect()
    }

    pub fn side_b(&self) -> Vec<String> {
        self.second.members().iter().map(|id| id.to_string()).collect()
    }
}

/// Pairs the oldest entry that has any compatible partner with its oldest
/// compatible partner. Pure: the snapshot is not modified.
pub fn find_pairing(entries: &[QueueEntry], policy: &PairingPolicy) -> Option<Pairing> {
    let mut ordered: Vec<&QueueEntry> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.fifo_key());

    for (index, first) in ordered.iter().enumerate() {
        if let Some(second) = ordered[index + 1..]
            .iter()
            .find(|candidate| policy.compatible(first, candidate))
        {
            return Some(Pairing {
                first: (*first).clone(),
                second: (*second).clone(),
            });
        }
    }
    None
}

/// The shared waiting list. Callers serialize access to it.
#[derive(Debug, Clone, Default)]
pub struct MatchmakingQueue {
    entries: Vec<QueueEntry>,
    next_sequence: u64,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.includes(player_id))
    }

    /// Rejects the entry if any of its members is already waiting, either
    /// with an entry of their own or as someone's partner.
    pub fn join(
        &mut self,
        player_id: &str,
        kind: QueueKind,
        level: u32,
        flash_points: i64,
    ) -> Result<QueueEntry, GameRuleError> {
        if let QueueKind::Squad { partner_id } = &kind {
            if partner_id.is_empty() || partner_id == player_id {
                return Err(GameRuleError::InvalidSettings(
                    "a squad entry needs a distinct partner".to_string(),
                ));
            }
        }

        let entry = QueueEntry {
            player_id: player_id.to_string(),
            kind,
            level,
            flash_points,
            created_at: Utc::now(),
            sequence: self.next_sequence,
        };
        if let Some(queued) = entry.members().into_iter().find(|id| self.contains(id)) {
            return Err(GameRuleError::AlreadyQueued(queued.to_string()));
        }

        self.next_sequence += 1;
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Removes the entry `player_id` belongs to. Absent players are a no-op.
    pub fn leave(&mut self, player_id: &str) -> Option<QueueEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.includes(player_id))?;
        Some(self.entries.remove(index))
    }

    /// Removes both entries of `pairing`, or neither if either is missing.
    pub fn remove_pair(&mut self, pairing: &Pairing) -> bool {
        let both_present = [&pairing.first, &pairing.second]
            .iter()
            .all(|wanted| self.entries.iter().any(|entry| entry == *wanted));
        if !both_present {
            return false;
        }
        self.entries
            .retain(|entry| entry != &pairing.first && entry != &pairing.second);
        true
    }

    pub fn snapshot(&self) -> Vec<QueueEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|entry| entry.fifo_key());
        entries
    }
}
