use serde::{Deserialize, Serialize};

use crate::models::{
    match_session::{MatchSession, Side, Winner},
    rewards::MatchRewards,
    round::RoundResult,
    CategoryId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEventKind {
    ChallengeIssued,
    ChallengeAccepted,
    ChallengeDeclined { by: Side },
    CategorySelected { round_number: u32, side: Side, category: CategoryId },
    AnswersSubmitted { round_number: u32, side: Side },
    RoundCompleted { result: RoundResult },
    MatchCompleted { winner: Winner, rewards: Option<MatchRewards> },
    Surrendered { by: Side },
}

/// A state change that the other participants should hear about. Delivery
/// is at-least-once, so receivers must tolerate repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub match_id: String,
    pub recipients: Vec<String>,
    #[serde(flatten)]
    pub kind: MatchEventKind,
}

impl MatchEvent {
    /// An event addressed to every participant of `session`.
    pub fn for_match(session: &MatchSession, kind: MatchEventKind) -> Self {
        MatchEvent {
            match_id: session.match_id.clone(),
            recipients: session.all_players(),
            kind,
        }
    }

    /// An event addressed to the players of `side` only.
    pub fn for_side(session: &MatchSession, side: Side, kind: MatchEventKind) -> Self {
        MatchEvent {
            match_id: session.match_id.clone(),
            recipients: session.players(side).to_vec(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            MatchEventKind::ChallengeIssued => "challenge_issued",
            MatchEventKind::ChallengeAccepted => "challenge_accepted",
            MatchEventKind::ChallengeDeclined { .. } => "challenge_declined",
            MatchEventKind::CategorySelected { .. } => "category_selected",
            MatchEventKind::AnswersSubmitted { .. } => "answers_submitted",
            MatchEventKind::RoundCompleted { .. } => "round_completed",
            MatchEventKind::MatchCompleted { .. } => "match_completed",
            MatchEventKind::Surrendered { .. } => "surrendered",
        }
    }
}
