use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    achievement::{AchievementCatalog, TrackedStat, UnlockedMilestone},
    rewards::RewardDelta,
    CategoryId,
};

/// Experience needed to go from `level` to `level + 1`:
/// `floor(100 * 1.5^(level - 1))`.
pub fn experience_to_next_level(level: u32) -> u64 {
    let exponent = level.max(1) - 1;
    let required = 100.0 * 1.5f64.powi(exponent.min(i32::MAX as u32) as i32);
    // `as` saturates, so absurd levels simply become unreachable.
    required.floor() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    /// Experience accumulated inside the current level.
    pub experience: u64,
}

impl Default for LevelProgress {
    fn default() -> Self {
        LevelProgress {
            level: 1,
            experience: 0,
        }
    }
}

impl LevelProgress {
    /// Applies an experience delta, crossing as many level boundaries as it
    /// covers. Losses walk back down through previous levels but stop at
    /// level 1 with 0 experience.
    pub fn apply_experience(self, delta: i64) -> LevelProgress {
        let mut level = self.level.max(1);
        let mut experience = self.experience;

        if delta >= 0 {
            experience = experience.saturating_add(delta as u64);
            loop {
                let required = experience_to_next_level(level);
                if experience < required || level == u32::MAX {
                    break;
                }
                experience -= required;
                level += 1;
            }
        } else {
            let mut remaining = delta.unsigned_abs();
            while remaining > 0 {
                if experience >= remaining {
                    experience -= remaining;
                    break;
                }
                remaining -= experience;
                experience = 0;
                if level == 1 {
                    break;
                }
                level -= 1;
                experience = experience_to_next_level(level);
            }
        }

        LevelProgress { level, experience }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub answered: u64,
    pub correct: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatChange {
    Increment(u64),
    /// Keeps the larger of the stored and the given value.
    Max(u64),
}

/// Everything one event changes on an account, applied atomically by the
/// account repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub reward: RewardDelta,
    pub stats: Vec<(TrackedStat, StatChange)>,
    pub categories: Vec<(CategoryId, CategoryStats)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountChange {
    pub account: Account,
    pub level_before: u32,
    /// Total reward paid, milestone rewards included.
    pub reward: RewardDelta,
    pub unlocked: Vec<UnlockedMilestone>,
}

impl AccountChange {
    pub fn levels_gained(&self) -> i64 {
        self.account.level as i64 - self.level_before as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub player_id: String,
    pub flash_points: i64,
    pub level: u32,
    pub experience: u64,
    #[serde(default)]
    pub stats: BTreeMap<String, u64>,
    /// Keyed by category id rendered as a string.
    #[serde(default)]
    pub category_stats: BTreeMap<String, CategoryStats>,
    #[serde(default)]
    pub unlocked_milestones: BTreeSet<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(player_id: &str) -> Self {
        let now = Utc::now();
        Account {
            player_id: player_id.to_string(),
            flash_points: 0,
            level: 1,
            experience: 0,
            stats: BTreeMap::new(),
            category_stats: BTreeMap::new(),
            unlocked_milestones: BTreeSet::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn progress(&self) -> LevelProgress {
        LevelProgress {
            level: self.level,
            experience: self.experience,
        }
    }

    pub fn stat(&self, stat: TrackedStat) -> u64 {
        self.stats.get(stat.key()).copied().unwrap_or(0)
    }

    /// Applies `update`, then unlocks any milestone it makes reachable and
    /// pays that milestone's reward. A milestone already recorded on the
    /// account is never paid again.
    pub fn apply(&mut self, update: &AccountUpdate, catalog: &AchievementCatalog) -> AccountChange {
        let level_before = self.level;

        for (stat, change) in &update.stats {
            let entry = self.stats.entry(stat.key().to_string()).or_insert(0);
            *entry = match change {
                StatChange::Increment(by) => entry.saturating_add(*by),
                StatChange::Max(value) => (*entry).max(*value),
            };
        }
        for (category_id, delta) in &update.categories {
            let entry = self
                .category_stats
                .entry(category_id.to_string())
                .or_default();
            entry.answered += delta.answered;
            entry.correct += delta.correct;
        }

        let unlocked = catalog.newly_reached(&self.stats, &self.unlocked_milestones);
        let mut reward = update.reward;
        for milestone in &unlocked {
            self.unlocked_milestones.insert(milestone.milestone_id.clone());
            reward = reward.plus(milestone.reward);
        }

        self.flash_points = (self.flash_points + reward.flash_points).max(0);
        let progress = self.progress().apply_experience(reward.experience);
        self.level = progress.level;
        self.experience = progress.experience;
        self.version += 1;
        self.updated_at = Utc::now();

        AccountChange {
            account: self.clone(),
            level_before,
            reward,
            unlocked,
        }
    }
}
