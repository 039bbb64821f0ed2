use crate::models::{
    blitz::BlitzSession,
    match_session::{MatchSession, MatchStatus, Scoreboard, Side},
    rewards::{DuelBand, MatchRewards, RewardDelta, RewardTable, ThresholdBonus},
};

/// Pure reward rules. Holds the reward table and nothing else.
#[derive(Debug, Clone, Default)]
pub struct ScoringService {
    table: RewardTable,
}

fn highest_bonus(bonuses: &[ThresholdBonus], value: u32) -> i64 {
    bonuses
        .iter()
        .filter(|bonus| value >= bonus.threshold)
        .map(|bonus| bonus.bonus)
        .max()
        .unwrap_or(0)
}

impl ScoringService {
    pub fn new(table: RewardTable) -> Self {
        ScoringService { table }
    }

    pub fn table(&self) -> &RewardTable {
        &self.table
    }

    /// The band paying out a win by `diff` points. `None` only for a draw.
    pub fn band_for(&self, diff: u32) -> Option<&DuelBand> {
        if diff == 0 {
            return None;
        }
        self.table.duel_bands.iter().find(|band| band.contains(diff))
    }

    /// Rewards for a match decided on points.
    pub fn duel_rewards(&self, scores: &Scoreboard) -> MatchRewards {
        let diff = scores.side_a.abs_diff(scores.side_b);
        let band = match self.band_for(diff) {
            Some(band) => band,
            None => {
                return MatchRewards {
                    side_a: self.table.draw,
                    side_b: self.table.draw,
                }
            }
        };
        if scores.side_a > scores.side_b {
            MatchRewards {
                side_a: band.winner,
                side_b: band.loser,
            }
        } else {
            MatchRewards {
                side_a: band.loser,
                side_b: band.winner,
            }
        }
    }

    pub fn surrender_rewards(&self, surrendered_by: Side) -> MatchRewards {
        let winner = self.table.surrender_winner();
        let loser = self.table.surrender_loser();
        match surrendered_by {
            Side::A => MatchRewards {
                side_a: loser,
                side_b: winner,
            },
            Side::B => MatchRewards {
                side_a: winner,
                side_b: loser,
            },
        }
    }

    /// Per-side rewards of a completed match. `None` while it is still open.
    pub fn match_rewards(&self, session: &MatchSession) -> Option<MatchRewards> {
        if session.status != MatchStatus::Completed {
            return None;
        }
        Some(match session.surrendered_by {
            Some(side) => self.surrender_rewards(side),
            None => self.duel_rewards(&session.scores),
        })
    }

    pub fn blitz_experience(&self, session: &BlitzSession) -> i64 {
        let blitz = &self.table.blitz;
        let correct = session.correct_answers;
        let band_xp = blitz
            .xp_bands
            .iter()
            .find(|band| {
                correct >= band.min_correct && band.max_correct.map_or(true, |max| correct <= max)
            })
            .map(|band| {
                let xp = band.base_xp + band.xp_per_correct * (correct - band.min_correct) as i64;
                band.max_xp.map_or(xp, |max| xp.min(max))
            })
            .unwrap_or(0);

        band_xp
            + highest_bonus(&blitz.accuracy_xp_bonuses, session.accuracy_percent())
            + blitz.xp_per_remaining_life * session.lives_remaining as i64
    }

    pub fn blitz_flash_points(&self, session: &BlitzSession) -> i64 {
        let blitz = &self.table.blitz;
        session.score as i64
            + highest_bonus(&blitz.streak_fp_bonuses, session.best_streak)
            + highest_bonus(&blitz.accuracy_fp_bonuses, session.accuracy_percent())
    }

    pub fn blitz_rewards(&self, session: &BlitzSession) -> RewardDelta {
        RewardDelta::new(self.blitz_flash_points(session), self.blitz_experience(session))
    }
}
