//! Read-time migration for round questions persisted before option order was
//! stored alongside the question.
//!
//! Legacy rows only hold the correct answer and the incorrect answers. They are
//! converted into a [`RoundQuestion`] once, during deserialization, with a
//! layout derived from a SHA-256 digest of each option. Every reader of the
//! same row therefore sees the same layout, and anything written back is in
//! the current format.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::models::question::RoundQuestion;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoredRoundQuestion {
    Current(CurrentRoundQuestion),
    Legacy(LegacyRoundQuestion),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentRoundQuestion {
    pub question_id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_option: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyRoundQuestion {
    pub question_id: String,
    pub prompt: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

impl From<StoredRoundQuestion> for RoundQuestion {
    fn from(stored: StoredRoundQuestion) -> Self {
        match stored {
            StoredRoundQuestion::Current(current) => RoundQuestion {
                question_id: current.question_id,
                prompt: current.prompt,
                options: current.options,
                correct_option: current.correct_option,
            },
            StoredRoundQuestion::Legacy(legacy) => migrate_legacy_question(legacy),
        }
    }
}

fn option_digest(question_id: &str, option: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(question_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(option.as_bytes());
    hasher.finalize().to_vec()
}

pub fn migrate_legacy_question(legacy: LegacyRoundQuestion) -> RoundQuestion {
    let mut candidates = Vec::with_capacity(legacy.incorrect_answers.len() + 1);
    candidates.push(legacy.correct_answer);
    candidates.extend(legacy.incorrect_answers);

    // Index 0 is the correct answer. Equal digests fall back to index order.
    let mut layout: Vec<usize> = (0..candidates.len()).collect();
    layout.sort_by_cached_key(|&i| (option_digest(&legacy.question_id, &candidates[i]), i));
    let correct_option = layout.iter().position(|&i| i == 0).unwrap_or(0);
    let options = layout.iter().map(|&i| candidates[i].clone()).collect();

    RoundQuestion {
        question_id: legacy.question_id,
        prompt: legacy.prompt,
        options,
        correct_option,
    }
}
