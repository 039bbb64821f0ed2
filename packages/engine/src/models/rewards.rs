use serde::{Deserialize, Serialize};

/// Flash point and experience change applied to one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDelta {
    pub flash_points: i64,
    pub experience: i64,
}

impl RewardDelta {
    pub const fn new(flash_points: i64, experience: i64) -> Self {
        RewardDelta {
            flash_points,
            experience,
        }
    }

    pub fn plus(self, other: RewardDelta) -> RewardDelta {
        RewardDelta {
            flash_points: self.flash_points + other.flash_points,
            experience: self.experience + other.experience,
        }
    }
}

/// Per-side rewards decided once when a match is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRewards {
    pub side_a: RewardDelta,
    pub side_b: RewardDelta,
}

/// One score-difference band of the duel reward rule. `max_diff: None` makes
/// the band open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelBand {
    pub min_diff: u32,
    pub max_diff: Option<u32>,
    pub winner: RewardDelta,
    pub loser: RewardDelta,
}

impl DuelBand {
    pub fn contains(&self, diff: u32) -> bool {
        diff >= self.min_diff && self.max_diff.map_or(true, |max| diff <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlitzXpBand {
    pub min_correct: u32,
    pub max_correct: Option<u32>,
    pub base_xp: i64,
    pub xp_per_correct: i64,
    pub max_xp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdBonus {
    pub threshold: u32,
    pub bonus: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlitzRewardTable {
    pub xp_bands: Vec<BlitzXpBand>,
    /// Keyed on accuracy percent; only the highest reached threshold pays.
    pub accuracy_xp_bonuses: Vec<ThresholdBonus>,
    pub xp_per_remaining_life: i64,
    /// Keyed on best streak; only the highest reached threshold pays.
    pub streak_fp_bonuses: Vec<ThresholdBonus>,
    pub accuracy_fp_bonuses: Vec<ThresholdBonus>,
}

impl Default for BlitzRewardTable {
    fn default() -> Self {
        BlitzRewardTable {
            xp_bands: vec![
                BlitzXpBand {
                    min_correct: 0,
                    max_correct: Some(3),
                    base_xp: 10,
                    xp_per_correct: 5,
                    max_xp: None,
                },
                BlitzXpBand {
                    min_correct: 4,
                    max_correct: Some(7),
                    base_xp: 30,
                    xp_per_correct: 8,
                    max_xp: None,
                },
                BlitzXpBand {
                    min_correct: 8,
                    max_correct: Some(12),
                    base_xp: 60,
                    xp_per_correct: 10,
                    max_xp: None,
                },
                BlitzXpBand {
                    min_correct: 13,
                    max_correct: Some(20),
                    base_xp: 110,
                    xp_per_correct: 10,
                    max_xp: None,
                },
                BlitzXpBand {
                    min_correct: 21,
                    max_correct: None,
                    base_xp: 200,
                    xp_per_correct: 10,
                    max_xp: Some(400),
                },
            ],
            accuracy_xp_bonuses: vec![
                ThresholdBonus { threshold: 80, bonus: 20 },
                ThresholdBonus { threshold: 90, bonus: 30 },
                ThresholdBonus { threshold: 100, bonus: 50 },
            ],
            xp_per_remaining_life: 15,
            streak_fp_bonuses: vec![
                ThresholdBonus { threshold: 5, bonus: 10 },
                ThresholdBonus { threshold: 10, bonus: 25 },
                ThresholdBonus { threshold: 20, bonus: 50 },
            ],
            accuracy_fp_bonuses: vec![
                ThresholdBonus { threshold: 90, bonus: 15 },
                ThresholdBonus { threshold: 100, bonus: 30 },
            ],
        }
    }
}

/// Product-tunable reward constants. Loaded from configuration and validated
/// before the engine accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTable {
    pub duel_bands: Vec<DuelBand>,
    pub draw: RewardDelta,
    pub blitz: BlitzRewardTable,
}

impl Default for RewardTable {
    fn default() -> Self {
        RewardTable {
            duel_bands: vec![
                DuelBand {
                    min_diff: 1,
                    max_diff: Some(2),
                    winner: RewardDelta::new(70, 90),
                    loser: RewardDelta::new(30, -10),
                },
                DuelBand {
                    min_diff: 3,
                    max_diff: Some(5),
                    winner: RewardDelta::new(100, 150),
                    loser: RewardDelta::new(0, -30),
                },
                DuelBand {
                    min_diff: 6,
                    max_diff: None,
                    winner: RewardDelta::new(130, 200),
                    loser: RewardDelta::new(0, -50),
                },
            ],
            draw: RewardDelta::new(50, 75),
            blitz: BlitzRewardTable::default(),
        }
    }
}

impl RewardTable {
    /// Checks that the duel bands cover every positive difference exactly
    /// once, and that the Blitz bands cover every correct count from zero.
    pub fn validate(&self) -> Result<(), String> {
        let mut expected_min = 1u32;
        for (index, band) in self.duel_bands.iter().enumerate() {
            if band.min_diff != expected_min {
                return Err(format!(
                    "duel band {} starts at {} but {} was expected",
                    index, band.min_diff, expected_min
                ));
            }
            match band.max_diff {
                Some(max) if max < band.min_diff => {
                    return Err(format!("duel band {} ends before it starts", index));
                }
                Some(max) => expected_min = max + 1,
                None if index + 1 != self.duel_bands.len() => {
                    return Err(format!("duel band {} is open-ended but not last", index));
                }
                None => return self.validate_blitz(),
            }
        }
        Err("the last duel band must be open-ended".to_string())
    }

    fn validate_blitz(&self) -> Result<(), String> {
        let bands = &self.blitz.xp_bands;
        let mut expected_min = 0u32;
        for (index, band) in bands.iter().enumerate() {
            if band.min_correct != expected_min {
                return Err(format!(
                    "blitz band {} starts at {} but {} was expected",
                    index, band.min_correct, expected_min
                ));
            }
            match band.max_correct {
                Some(max) if max < band.min_correct => {
                    return Err(format!("blitz band {} ends before it starts", index));
                }
                Some(max) => expected_min = max + 1,
                None if index + 1 != bands.len() => {
                    return Err(format!("blitz band {} is open-ended but not last", index));
                }
                None => return Ok(()),
            }
        }
        Err("the last blitz band must be open-ended".to_string())
    }

    /// Smallest winning band; paid to the winner of a surrendered match.
    pub fn surrender_winner(&self) -> RewardDelta {
        self.duel_bands
            .first()
            .map(|band| band.winner)
            .unwrap_or_default()
    }

    /// Harshest losing band; paid to the side that surrendered.
    pub fn surrender_loser(&self) -> RewardDelta {
        self.duel_bands
            .last()
            .map(|band| band.loser)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        assert_eq!(RewardTable::default().validate(), Ok(()));
    }

    #[test]
    fn test_gap_between_bands_is_rejected() {
        let mut table = RewardTable::default();
        table.duel_bands[1].min_diff = 4;

        assert!(table.validate().is_err());
    }

    #[test]
    fn test_overlapping_bands_are_rejected() {
        let mut table = RewardTable::default();
        table.duel_bands[1].min_diff = 2;

        assert!(table.validate().is_err());
    }

    #[test]
    fn test_bounded_last_band_is_rejected() {
        let mut table = RewardTable::default();
        table.duel_bands[2].max_diff = Some(10);

        assert_eq!(
            table.validate(),
            Err("the last duel band must be open-ended".to_string())
        );
    }

    #[test]
    fn test_blitz_band_gap_is_rejected() {
        let mut table = RewardTable::default();
        table.blitz.xp_bands[2].min_correct = 9;

        assert!(table.validate().is_err());
    }

    #[test]
    fn test_surrender_rewards_use_extreme_bands() {
        let table = RewardTable::default();

        assert_eq!(table.surrender_winner(), RewardDelta::new(70, 90));
        assert_eq!(table.surrender_loser(), RewardDelta::new(0, -50));
    }

    #[test]
    fn test_table_round_trips_through_json() {
        let table = RewardTable::default();
        let json = serde_json::to_string(&table).unwrap();

        let parsed: RewardTable = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, table);
    }
}
