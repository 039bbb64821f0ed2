use chrono::{DateTime, Utc};
use engine::models::{
    match_session::{MatchMode, MatchSession, MatchStatus, Scoreboard, Side, Turn, Winner},
    question::QuestionView,
    rewards::MatchRewards,
    round::{AnswerRecord, Round, RoundState},
    CategoryId,
};
use serde::Serialize;

/// A round as players may see it. Correct options and recorded answers stay
/// hidden until both sides have submitted.
#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    pub round_number: u32,
    pub chooser: Option<Side>,
    pub category: Option<CategoryId>,
    pub state: RoundState,
    pub questions: Vec<QuestionView>,
    pub submitted_a: bool,
    pub submitted_b: bool,
    pub answers_a: Option<Vec<AnswerRecord>>,
    pub answers_b: Option<Vec<AnswerRecord>>,
}

impl From<&Round> for RoundView {
    fn from(round: &Round) -> Self {
        let complete = round.state == RoundState::Complete;
        let revealed = |side: Side| {
            if complete {
                round.answers(side).map(|answers| answers.to_vec())
            } else {
                None
            }
        };

        RoundView {
            round_number: round.round_number,
            chooser: round.chooser,
            category: round.category,
            state: round.state,
            questions: round
                .questions
                .iter()
                .map(|question| QuestionView::from_round_question(question, complete))
                .collect(),
            submitted_a: round.has_submitted(Side::A),
            submitted_b: round.has_submitted(Side::B),
            answers_a: revealed(Side::A),
            answers_b: revealed(Side::B),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchView {
    pub match_id: String,
    pub mode: MatchMode,
    pub side_a: Vec<String>,
    pub side_b: Vec<String>,
    pub status: MatchStatus,
    pub current_round: u32,
    pub total_rounds: u32,
    pub questions_per_round: usize,
    pub master_category: Option<CategoryId>,
    pub current_turn: Option<Turn>,
    pub scores: Scoreboard,
    pub winner: Option<Winner>,
    pub surrendered_by: Option<Side>,
    pub rewards: Option<MatchRewards>,
    pub rounds: Vec<RoundView>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl From<&MatchSession> for MatchView {
    fn from(session: &MatchSession) -> Self {
        MatchView {
            match_id: session.match_id.clone(),
            mode: session.mode,
            side_a: session.side_a.clone(),
            side_b: session.side_b.clone(),
            status: session.status,
            current_round: session.current_round,
            total_rounds: session.total_rounds,
            questions_per_round: session.questions_per_round,
            master_category: session.master_category,
            current_turn: session.current_turn(),
            scores: session.scores,
            winner: session.winner,
            surrendered_by: session.surrendered_by,
            rewards: session.rewards,
            rounds: session.rounds.iter().map(RoundView::from).collect(),
            version: session.version,
            updated_at: session.updated_at,
        }
    }
}
