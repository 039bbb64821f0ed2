use serde::{Deserialize, Serialize};

use crate::models::errors::GameRuleError;

/// Summary of a finished solo Blitz run, as reported by the game client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlitzSession {
    pub correct_answers: u32,
    pub questions_answered: u32,
    /// In-session score; paid out one-for-one as flash points.
    pub score: u32,
    pub best_streak: u32,
    pub lives_remaining: u32,
}

impl BlitzSession {
    /// Whole-number accuracy percentage, 0 when nothing was answered.
    pub fn accuracy_percent(&self) -> u32 {
        if self.questions_answered == 0 {
            return 0;
        }
        ((self.correct_answers as u64 * 100) / self.questions_answered as u64) as u32
    }

    pub fn validate(&self) -> Result<(), GameRuleError> {
        if self.correct_answers > self.questions_answered {
            return Err(GameRuleError::InvalidSettings(format!(
                "{} correct answers out of {} answered",
                self.correct_answers, self.questions_answered
            )));
        }
        if self.best_streak > self.correct_answers {
            return Err(GameRuleError::InvalidSettings(format!(
                "streak of {} exceeds {} correct answers",
                self.best_streak, self.correct_answers
            )));
        }
        Ok(())
    }
}
