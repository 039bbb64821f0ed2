use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::rewards::RewardDelta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AchievementTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl AchievementTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementTier::Bronze => "bronze",
            AchievementTier::Silver => "silver",
            AchievementTier::Gold => "gold",
            AchievementTier::Platinum => "platinum",
            AchievementTier::Diamond => "diamond",
        }
    }
}

/// Account statistics that achievements can track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackedStat {
    MatchesPlayed,
    MatchesWon,
    CorrectAnswers,
    PerfectRounds,
    BlitzSessions,
    BlitzBestScore,
}

impl TrackedStat {
    pub fn key(&self) -> &'static str {
        match self {
            TrackedStat::MatchesPlayed => "matches_played",
            TrackedStat::MatchesWon => "matches_won",
            TrackedStat::CorrectAnswers => "correct_answers",
            TrackedStat::PerfectRounds => "perfect_rounds",
            TrackedStat::BlitzSessions => "blitz_sessions",
            TrackedStat::BlitzBestScore => "blitz_best_score",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub tier: AchievementTier,
    pub target: u64,
    pub reward: RewardDelta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub achievement_id: String,
    pub stat: TrackedStat,
    /// Ordered by ascending target.
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockedMilestone {
    pub milestone_id: String,
    pub achievement_id: String,
    pub tier: AchievementTier,
    pub reward: RewardDelta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementCatalog {
    pub achievements: Vec<AchievementDefinition>,
}

fn ladder(
    achievement_id: &str,
    stat: TrackedStat,
    targets: [u64; 5],
    rewards: [RewardDelta; 5],
) -> AchievementDefinition {
    let tiers = [
        AchievementTier::Bronze,
        AchievementTier::Silver,
        AchievementTier::Gold,
        AchievementTier::Platinum,
        AchievementTier::Diamond,
    ];
    AchievementDefinition {
        achievement_id: achievement_id.to_string(),
        stat,
        milestones: tiers
            .iter()
            .zip(targets.iter().zip(rewards.iter()))
            .map(|(tier, (target, reward))| Milestone {
                tier: *tier,
                target: *target,
                reward: *reward,
            })
            .collect(),
    }
}

const STANDARD_REWARDS: [RewardDelta; 5] = [
    RewardDelta::new(25, 50),
    RewardDelta::new(50, 100),
    RewardDelta::new(100, 200),
    RewardDelta::new(200, 400),
    RewardDelta::new(500, 1000),
];

impl Default for AchievementCatalog {
    fn default() -> Self {
        AchievementCatalog {
            achievements: vec![
                ladder("veteran", TrackedStat::MatchesPlayed, [10, 50, 100, 500, 1000], STANDARD_REWARDS),
                ladder("champion", TrackedStat::MatchesWon, [5, 25, 50, 250, 500], STANDARD_REWARDS),
                ladder("scholar", TrackedStat::CorrectAnswers, [50, 250, 1000, 5000, 10000], STANDARD_REWARDS),
                ladder("flawless", TrackedStat::PerfectRounds, [5, 25, 100, 250, 500], STANDARD_REWARDS),
                ladder("sprinter", TrackedStat::BlitzSessions, [5, 25, 100, 250, 500], STANDARD_REWARDS),
                ladder("blitz_master", TrackedStat::BlitzBestScore, [50, 100, 200, 350, 500], STANDARD_REWARDS),
            ],
        }
    }
}

impl AchievementCatalog {
    pub fn milestone_id(achievement_id: &str, tier: AchievementTier) -> String {
        format!("{}#{}", achievement_id, tier.as_str())
    }

    /// Milestones whose target is reached by `stats` and that are not in
    /// `unlocked` yet.
    pub fn newly_reached(
        &self,
        stats: &BTreeMap<String, u64>,
        unlocked: &BTreeSet<String>,
    ) -> Vec<UnlockedMilestone> {
        let mut reached = Vec::new();
        for achievement in &self.achievements {
            let value = stats.get(achievement.stat.key()).copied().unwrap_or(0);
            for milestone in &achievement.milestones {
                if value < milestone.target {
                    break;
                }
                let milestone_id =
                    Self::milestone_id(&achievement.achievement_id, milestone.tier);
                if unlocked.contains(&milestone_id) {
                    continue;
                }
                reached.push(UnlockedMilestone {
                    milestone_id,
                    achievement_id: achievement.achievement_id.clone(),
                    tier: milestone.tier,
                    reward: milestone.reward,
                });
            }
        }
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(key: &str, value: u64) -> BTreeMap<String, u64> {
        let mut stats = BTreeMap::new();
        stats.insert(key.to_string(), value);
        stats
    }

    #[test]
    fn test_nothing_reached_below_first_target() {
        let catalog = AchievementCatalog::default();

        let reached = catalog.newly_reached(&stats("matches_won", 4), &BTreeSet::new());

        assert!(reached.is_empty());
    }

    #[test]
    fn test_reaching_target_exactly_unlocks() {
        let catalog = AchievementCatalog::default();

        let reached = catalog.newly_reached(&stats("matches_won", 5), &BTreeSet::new());

        assert_eq!(reached.len(), 1);
        assert_eq!(reached[0].milestone_id, "champion#bronze");
        assert_eq!(reached[0].reward, RewardDelta::new(25, 50));
    }

    #[test]
    fn test_jumping_several_tiers_unlocks_each_once() {
        let catalog = AchievementCatalog::default();

        let reached = catalog.newly_reached(&stats("correct_answers", 1200), &BTreeSet::new());

        let ids: Vec<&str> = reached.iter().map(|m| m.milestone_id.as_str()).collect();
        assert_eq!(ids, vec!["scholar#bronze", "scholar#silver", "scholar#gold"]);
    }

    #[test]
    fn test_already_unlocked_milestones_are_skipped() {
        let catalog = AchievementCatalog::default();
        let unlocked: BTreeSet<String> = ["scholar#bronze".to_string()].into_iter().collect();

        let reached = catalog.newly_reached(&stats("correct_answers", 300), &unlocked);

        assert_eq!(reached.len(), 1);
        assert_eq!(reached[0].tier, AchievementTier::Silver);
    }

    #[test]
    fn test_milestone_id_format() {
        assert_eq!(
            AchievementCatalog::milestone_id("veteran", AchievementTier::Diamond),
            "veteran#diamond"
        );
    }
}
