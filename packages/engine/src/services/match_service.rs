use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::{
    models::{
        events::{MatchEvent, MatchEventKind},
        match_session::{AdvanceOutcome, MatchSession, MatchSettings, Side},
        question::{Question, RoundQuestion},
        round::{RoundResult, SubmittedAnswer},
        CategoryId,
    },
    repositories::{
        errors::match_repository_errors::MatchRepositoryError,
        match_repository::MatchRepository, notification_repository::MatchEventPublisher,
        question_repository::QuestionRepository,
    },
    services::{
        errors::match_service_errors::MatchServiceError, progression_service::ProgressionService,
    },
};

fn shuffle_batch(questions: &[Question]) -> Vec<RoundQuestion> {
    let mut rng = rand::thread_rng();
    questions
        .iter()
        .map(|question| RoundQuestion::shuffled(question, &mut rng))
        .collect()
}

type LockMap = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

fn lock_map(locks: &LockMap) -> StdMutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    // Every critical section leaves the map consistent, poisoned or not.
    match locks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Exclusive hold on one match. Dropping it evicts the match's entry from the
/// lock map once nobody else holds or waits on it.
struct MatchLock {
    locks: LockMap,
    match_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for MatchLock {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = lock_map(&self.locks);
        let idle = locks
            .get(&self.match_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.match_id);
        }
    }
}

/// Server-authoritative coordinator for matches.
///
/// Every mutation runs under a per-match lock and is persisted with a
/// version check, so concurrent callers in this process are serialized and
/// callers in other processes lose with `ConcurrentModification` instead of
/// overwriting each other.
#[derive(Clone)]
pub struct MatchService {
    matches: Arc<dyn MatchRepository + Send + Sync>,
    questions: Arc<dyn QuestionRepository + Send + Sync>,
    publisher: Arc<dyn MatchEventPublisher + Send + Sync>,
    progression: ProgressionService,
    locks: LockMap,
}

impl MatchService {
    pub fn new(
        matches: Arc<dyn MatchRepository + Send + Sync>,
        questions: Arc<dyn QuestionRepository + Send + Sync>,
        publisher: Arc<dyn MatchEventPublisher + Send + Sync>,
        progression: ProgressionService,
    ) -> Self {
        MatchService {
            matches,
            questions,
            publisher,
            progression,
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    async fn lock_match(&self, match_id: &str) -> MatchLock {
        let lock = lock_map(&self.locks)
            .entry(match_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        MatchLock {
            locks: self.locks.clone(),
            match_id: match_id.to_string(),
            guard: Some(guard),
        }
    }

    fn map_repository_error(match_id: &str, err: MatchRepositoryError) -> MatchServiceError {
        match err {
            MatchRepositoryError::NotFound => MatchServiceError::MatchNotFound(match_id.to_string()),
            MatchRepositoryError::VersionConflict { .. } => {
                MatchServiceError::ConcurrentModification(match_id.to_string())
            }
            other => MatchServiceError::RepositoryError(other),
        }
    }

    async fn load(&self, match_id: &str) -> Result<MatchSession, MatchServiceError> {
        self.matches
            .get_match(match_id)
            .await
            .map_err(|e| Self::map_repository_error(match_id, e))
    }

    async fn load_for_player(
        &self,
        match_id: &str,
        player_id: &str,
    ) -> Result<(MatchSession, Side), MatchServiceError> {
        let session = self.load(match_id).await?;
        let side = session
            .side_of(player_id)
            .ok_or_else(|| MatchServiceError::NotParticipant {
                match_id: match_id.to_string(),
                player_id: player_id.to_string(),
            })?;
        Ok((session, side))
    }

    async fn draw_batch(
        &self,
        category_id: CategoryId,
        count: usize,
    ) -> Result<Vec<RoundQuestion>, MatchServiceError> {
        let questions = self.questions.draw_questions(category_id, count).await?;
        Ok(shuffle_batch(&questions))
    }

    /// Gives an opened fixed-category round its questions.
    async fn fill_fixed_batch(&self, session: &mut MatchSession) -> Result<(), MatchServiceError> {
        if let Some((round_number, category)) = session.pending_fixed_batch() {
            let batch = self.draw_batch(category, session.questions_per_round).await?;
            session.assign_fixed_batch(batch)?;
            debug!(
                "Assigned category {} batch to round {} of match {}",
                category, round_number, session.match_id
            );
        }
        Ok(())
    }

    async fn commit(
        &self,
        mut session: MatchSession,
        expected_version: u64,
    ) -> Result<MatchSession, MatchServiceError> {
        session.version = expected_version + 1;
        session.updated_at = Utc::now();
        self.matches
            .save_match(&session, expected_version)
            .await
            .map_err(|e| Self::map_repository_error(&session.match_id, e))?;
        Ok(session)
    }

    async fn publish(&self, event: MatchEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(
                "Failed to publish {} for match {}: {}",
                event.name(),
                event.match_id,
                e
            );
        }
    }

    /// Runs once, right after the commit that completed the match.
    async fn after_completion(&self, session: &MatchSession) {
        let (winner, rewards) = match (session.winner, session.rewards) {
            (Some(winner), Some(rewards)) => (winner, rewards),
            _ => return,
        };
        info!("Match {} completed with {:?}", session.match_id, winner);

        if let Err(e) = self.progression.award_match(session, &rewards).await {
            error!(
                "Failed to apply rewards for match {}: {}",
                session.match_id, e
            );
        }
        self.publish(MatchEvent::for_match(
            session,
            MatchEventKind::MatchCompleted {
                winner,
                rewards: Some(rewards),
            },
        ))
        .await;
    }

    /// Folds a completed round into `session`, opening the next round or
    /// settling the match rewards.
    async fn apply_advance(
        &self,
        session: &mut MatchSession,
        round_number: u32,
    ) -> Result<AdvanceOutcome, MatchServiceError> {
        let outcome = session.advance_after_round_complete(round_number)?;
        match outcome {
            AdvanceOutcome::NextRound { round_number: next } => {
                // The finished round stands even when the next batch cannot be
                // drawn. The round stays pending until a later read or advance.
                if let Err(e) = self.fill_fixed_batch(session).await {
                    warn!(
                        "Round {} of match {} is waiting for questions: {}",
                        next, session.match_id, e
                    );
                }
            }
            AdvanceOutcome::Completed { .. } => {
                session.rewards = self.progression.scoring().match_rewards(session);
            }
            AdvanceOutcome::AlreadyApplied => {}
        }
        Ok(outcome)
    }

    /// Issues a challenge from side A to side B.
    pub async fn create_match(
        &self,
        settings: &MatchSettings,
        side_a: Vec<String>,
        side_b: Vec<String>,
    ) -> Result<MatchSession, MatchServiceError> {
        let session = MatchSession::new(settings, side_a, side_b)?;
        self.matches.create_match(&session).await?;
        info!(
            "Created {:?} match {} between {:?} and {:?}",
            session.mode, session.match_id, session.side_a, session.side_b
        );
        self.publish(MatchEvent::for_match(&session, MatchEventKind::ChallengeIssued))
            .await;
        Ok(session)
    }

    /// Reads a match. A fixed-category round still waiting for its batch is
    /// filled on the way out when the question store allows it.
    pub async fn get_match(&self, match_id: &str) -> Result<MatchSession, MatchServiceError> {
        let session = self.load(match_id).await?;
        if session.pending_fixed_batch().is_none() {
            return Ok(session);
        }

        let _guard = self.lock_match(match_id).await;
        let stored = self.load(match_id).await?;
        match self.refill_pending_batch(&stored).await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Ok(stored),
            Err(e) => {
                warn!("Could not fill the open round of match {}: {}", match_id, e);
                Ok(stored)
            }
        }
    }

    /// Draws and stores the batch of a pending fixed-category round. Returns
    /// `None` when no round is waiting.
    async fn refill_pending_batch(
        &self,
        stored: &MatchSession,
    ) -> Result<Option<MatchSession>, MatchServiceError> {
        if stored.pending_fixed_batch().is_none() {
            return Ok(None);
        }
        let mut session = stored.clone();
        self.fill_fixed_batch(&mut session).await?;
        let session = self.commit(session, stored.version).await?;
        info!(
            "Opened round {} of match {}",
            session.current_round, session.match_id
        );
        Ok(Some(session))
    }

    pub async fn accept_challenge(
        &self,
        match_id: &str,
        player_id: &str,
    ) -> Result<MatchSession, MatchServiceError> {
        let _guard = self.lock_match(match_id).await;

        let (stored, side) = self.load_for_player(match_id, player_id).await?;
        let mut session = stored.clone();
        session.accept(side)?;
        self.fill_fixed_batch(&mut session).await?;
        let session = self.commit(session, stored.version).await?;

        info!("Player {} accepted match {}", player_id, match_id);
        self.publish(MatchEvent::for_match(&session, MatchEventKind::ChallengeAccepted))
            .await;
        Ok(session)
    }

    /// Withdraws a pending challenge. Either side may decline.
    pub async fn decline_challenge(
        &self,
        match_id: &str,
        player_id: &str,
    ) -> Result<(), MatchServiceError> {
        let _guard = self.lock_match(match_id).await;

        let (session, side) = self.load_for_player(match_id, player_id).await?;
        session.check_decline(side)?;
        self.matches
            .delete_match(match_id, session.version)
            .await
            .map_err(|e| Self::map_repository_error(match_id, e))?;

        info!("Player {} declined match {}", player_id, match_id);
        self.publish(MatchEvent::for_match(
            &session,
            MatchEventKind::ChallengeDeclined { by: side },
        ))
        .await;
        Ok(())
    }

    pub async fn select_category(
        &self,
        match_id: &str,
        player_id: &str,
        round_number: u32,
        category_id: CategoryId,
    ) -> Result<MatchSession, MatchServiceError> {
        let _guard = self.lock_match(match_id).await;

        let (stored, side) = self.load_for_player(match_id, player_id).await?;
        // Rejected selections must not consume a draw from the question store.
        stored.check_category_selection(side, round_number)?;
        let batch = self
            .draw_batch(category_id, stored.questions_per_round)
            .await?;

        let mut session = stored.clone();
        session.select_category(side, round_number, category_id, batch)?;
        let session = self.commit(session, stored.version).await?;

        info!(
            "Side {} picked category {} for round {} of match {}",
            side, category_id, round_number, match_id
        );
        self.publish(MatchEvent::for_match(
            &session,
            MatchEventKind::CategorySelected {
                round_number,
                side,
                category: category_id,
            },
        ))
        .await;
        Ok(session)
    }

    /// Records a side's answers. The submission that completes the round
    /// also advances the match in the same commit.
    pub async fn submit_answers(
        &self,
        match_id: &str,
        player_id: &str,
        round_number: u32,
        answers: &[SubmittedAnswer],
    ) -> Result<MatchSession, MatchServiceError> {
        let _guard = self.lock_match(match_id).await;

        let (stored, side) = self.load_for_player(match_id, player_id).await?;
        let mut session = stored.clone();
        let completed_round: Option<RoundResult> =
            session.submit_answers(side, round_number, answers)?;
        if completed_round.is_some() {
            self.apply_advance(&mut session, round_number).await?;
        }
        let session = self.commit(session, stored.version).await?;

        info!(
            "Side {} submitted {} answers for round {} of match {}",
            side,
            answers.len(),
            round_number,
            match_id
        );
        self.publish(MatchEvent::for_match(
            &session,
            MatchEventKind::AnswersSubmitted { round_number, side },
        ))
        .await;
        if let Some(result) = completed_round {
            self.publish(MatchEvent::for_match(
                &session,
                MatchEventKind::RoundCompleted { result },
            ))
            .await;
            if session.is_completed() {
                self.after_completion(&session).await;
            }
        }
        Ok(session)
    }

    /// Handles an external "round complete" notification. Duplicates are
    /// absorbed as `AlreadyApplied` without touching storage, unless the next
    /// round is still waiting for its questions, which are drawn again.
    pub async fn advance_after_round_complete(
        &self,
        match_id: &str,
        round_number: u32,
    ) -> Result<(AdvanceOutcome, MatchSession), MatchServiceError> {
        let _guard = self.lock_match(match_id).await;

        let stored = self.load(match_id).await?;
        let mut session = stored.clone();
        let outcome = self.apply_advance(&mut session, round_number).await?;
        if outcome == AdvanceOutcome::AlreadyApplied {
            debug!(
                "Round {} of match {} was already applied",
                round_number, match_id
            );
            let session = self.refill_pending_batch(&stored).await?.unwrap_or(stored);
            return Ok((outcome, session));
        }

        let session = self.commit(session, stored.version).await?;
        info!(
            "Advanced match {} after round {}: {:?}",
            match_id, round_number, outcome
        );
        if session.is_completed() {
            self.after_completion(&session).await;
        }
        Ok((outcome, session))
    }

    pub async fn surrender(
        &self,
        match_id: &str,
        player_id: &str,
    ) -> Result<MatchSession, MatchServiceError> {
        let _guard = self.lock_match(match_id).await;

        let (stored, side) = self.load_for_player(match_id, player_id).await?;
        let mut session = stored.clone();
        session.surrender(side)?;
        session.rewards = self.progression.scoring().match_rewards(&session);
        let session = self.commit(session, stored.version).await?;

        info!("Side {} surrendered match {}", side, match_id);
        self.publish(MatchEvent::for_match(
            &session,
            MatchEventKind::Surrendered { by: side },
        ))
        .await;
        self.after_completion(&session).await;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        achievement::AchievementCatalog,
        errors::GameRuleError,
        match_session::{MatchStatus, Turn, Winner},
        round::RoundState,
    };
    use crate::repositories::{
        account_repository::{AccountRepository, InMemoryAccountRepository},
        errors::{
            notification_errors::NotificationError,
            question_repository_errors::QuestionRepositoryError,
        },
        match_repository::{InMemoryMatchRepository, MockMatchRepository},
        notification_repository::{InMemoryEventPublisher, MockMatchEventPublisher},
        question_repository::{InMemoryQuestionRepository, MockQuestionRepository},
    };
    use crate::services::scoring_service::ScoringService;

    struct Harness {
        service: MatchService,
        accounts: Arc<InMemoryAccountRepository>,
        events: Arc<InMemoryEventPublisher>,
    }

    fn bank() -> Vec<Question> {
        let mut questions = Vec::new();
        for category in 1..=3u32 {
            for i in 0..6 {
                questions.push(Question::new(
                    &format!("c{}-q{}", category, i),
                    category,
                    &format!("Question {} in category {}", i, category),
                    "right",
                    &["wrong-1", "wrong-2", "wrong-3"],
                ));
            }
        }
        questions
    }

    fn harness_with(questions: Arc<dyn QuestionRepository + Send + Sync>) -> Harness {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let events = Arc::new(InMemoryEventPublisher::new());
        let progression = ProgressionService::new(
            accounts.clone(),
            ScoringService::default(),
            AchievementCatalog::default(),
        );
        let service = MatchService::new(
            Arc::new(InMemoryMatchRepository::new()),
            questions,
            events.clone(),
            progression,
        );
        Harness {
            service,
            accounts,
            events,
        }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(InMemoryQuestionRepository::new(bank())))
    }

    /// Answers that get exactly `correct` of the round's questions right.
    fn answers_for(session: &MatchSession, round_number: u32, correct: usize) -> Vec<SubmittedAnswer> {
        let round = session.round(round_number).unwrap();
        round
            .questions
            .iter()
            .enumerate()
            .map(|(i, question)| {
                let option = if i < correct {
                    question.correct_option
                } else {
                    (question.correct_option + 1) % question.options.len()
                };
                SubmittedAnswer::choose(option, 1500)
            })
            .collect()
    }

    async fn active_duel(harness: &Harness) -> MatchSession {
        let session = harness
            .service
            .create_match(&MatchSettings::duel(), vec!["alice".into()], vec!["bob".into()])
            .await
            .unwrap();
        harness
            .service
            .accept_challenge(&session.match_id, "bob")
            .await
            .unwrap()
    }

    async fn play_round(
        harness: &Harness,
        match_id: &str,
        round_number: u32,
        correct_a: usize,
        correct_b: usize,
    ) -> MatchSession {
        let service = &harness.service;
        let session = service.get_match(match_id).await.unwrap();
        let session = match session.current_turn() {
            Some(Turn::ChooseCategory(side)) => {
                let chooser = &session.players(side)[0];
                service
                    .select_category(match_id, chooser, round_number, 1)
                    .await
                    .unwrap()
            }
            _ => session,
        };
        let a = answers_for(&session, round_number, correct_a);
        let b = answers_for(&session, round_number, correct_b);
        let player_a = session.side_a[0].clone();
        let player_b = session.side_b[0].clone();
        service
            .submit_answers(match_id, &player_a, round_number, &a)
            .await
            .unwrap();
        service
            .submit_answers(match_id, &player_b, round_number, &b)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_round_completion_advances_match() {
        let harness = harness();
        let session = active_duel(&harness).await;

        let session = play_round(&harness, &session.match_id, 1, 2, 1).await;

        assert_eq!(session.scores.side_a, 2);
        assert_eq!(session.scores.side_b, 1);
        assert_eq!(session.current_round, 2);
        assert_eq!(session.current_turn(), Some(Turn::ChooseCategory(Side::B)));
        assert_eq!(session.version, 4);
    }

    #[tokio::test]
    async fn test_round_questions_never_change_after_selection() {
        let harness = harness();
        let session = active_duel(&harness).await;
        let selected = harness
            .service
            .select_category(&session.match_id, "alice", 1, 2)
            .await
            .unwrap();
        let batch = selected.round(1).unwrap().questions.clone();

        let a = answers_for(&selected, 1, 3);
        let after = harness
            .service
            .submit_answers(&session.match_id, "alice", 1, &a)
            .await
            .unwrap();

        assert_eq!(after.round(1).unwrap().questions, batch);
        let reread = harness.service.get_match(&session.match_id).await.unwrap();
        assert_eq!(reread.round(1).unwrap().questions, batch);
    }

    #[tokio::test]
    async fn test_wrong_side_cannot_pick_category() {
        let harness = harness();
        let session = active_duel(&harness).await;

        let result = harness
            .service
            .select_category(&session.match_id, "bob", 1, 1)
            .await;

        assert!(matches!(
            result,
            Err(MatchServiceError::Rule(GameRuleError::WrongTurn(_)))
        ));
    }

    #[tokio::test]
    async fn test_rejected_selection_does_not_draw_questions() {
        let mut questions = MockQuestionRepository::new();
        questions.expect_draw_questions().never();
        let harness = harness_with(Arc::new(questions));
        let session = active_duel(&harness).await;

        let result = harness
            .service
            .select_category(&session.match_id, "bob", 1, 1)
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_small_category_is_unavailable() {
        let mut questions = MockQuestionRepository::new();
        questions.expect_draw_questions().returning(|category_id, count| {
            Err(QuestionRepositoryError::InsufficientPool {
                category_id,
                requested: count,
                available: 1,
            })
        });
        let harness = harness_with(Arc::new(questions));
        let session = active_duel(&harness).await;

        let result = harness
            .service
            .select_category(&session.match_id, "alice", 1, 42)
            .await;

        assert!(matches!(
            result,
            Err(MatchServiceError::Rule(GameRuleError::CategoryUnavailable(42)))
        ));
        let stored = harness.service.get_match(&session.match_id).await.unwrap();
        assert_eq!(stored.round(1).unwrap().state, RoundState::AwaitingCategory);
    }

    #[tokio::test]
    async fn test_duplicate_submission_keeps_first_answers() {
        let harness = harness();
        let session = active_duel(&harness).await;
        let selected = harness
            .service
            .select_category(&session.match_id, "alice", 1, 1)
            .await
            .unwrap();
        let first = answers_for(&selected, 1, 3);
        let second = answers_for(&selected, 1, 0);
        let after_first = harness
            .service
            .submit_answers(&session.match_id, "alice", 1, &first)
            .await
            .unwrap();

        let result = harness
            .service
            .submit_answers(&session.match_id, "alice", 1, &second)
            .await;

        assert!(matches!(
            result,
            Err(MatchServiceError::Rule(GameRuleError::DuplicateSubmission { round: 1 }))
        ));
        let stored = harness.service.get_match(&session.match_id).await.unwrap();
        assert_eq!(stored, after_first);
    }

    #[tokio::test]
    async fn test_outsider_is_not_a_participant() {
        let harness = harness();
        let session = active_duel(&harness).await;

        let result = harness.service.surrender(&session.match_id, "mallory").await;

        assert!(matches!(
            result,
            Err(MatchServiceError::NotParticipant { .. })
        ));
    }

    #[tokio::test]
    async fn test_challenger_cannot_accept() {
        let harness = harness();
        let session = harness
            .service
            .create_match(&MatchSettings::duel(), vec!["alice".into()], vec!["bob".into()])
            .await
            .unwrap();

        let result = harness
            .service
            .accept_challenge(&session.match_id, "alice")
            .await;

        assert!(matches!(
            result,
            Err(MatchServiceError::Rule(GameRuleError::WrongTurn(_)))
        ));
    }

    #[tokio::test]
    async fn test_decline_withdraws_challenge() {
        let harness = harness();
        let session = harness
            .service
            .create_match(&MatchSettings::duel(), vec!["alice".into()], vec!["bob".into()])
            .await
            .unwrap();

        harness
            .service
            .decline_challenge(&session.match_id, "bob")
            .await
            .unwrap();

        assert!(matches!(
            harness.service.get_match(&session.match_id).await,
            Err(MatchServiceError::MatchNotFound(_))
        ));
        let events = harness.events.events_for(&session.match_id).await;
        assert_eq!(
            events.last().unwrap().kind,
            MatchEventKind::ChallengeDeclined { by: Side::B }
        );
    }

    #[tokio::test]
    async fn test_decline_after_accept_is_rejected() {
        let harness = harness();
        let session = active_duel(&harness).await;

        let result = harness
            .service
            .decline_challenge(&session.match_id, "alice")
            .await;

        assert!(matches!(
            result,
            Err(MatchServiceError::Rule(GameRuleError::InvalidState(_)))
        ));
    }

    #[tokio::test]
    async fn test_master_rounds_open_with_questions() {
        let harness = harness();
        let session = harness
            .service
            .create_match(&MatchSettings::master(3), vec!["alice".into()], vec!["bob".into()])
            .await
            .unwrap();

        let session = harness
            .service
            .accept_challenge(&session.match_id, "bob")
            .await
            .unwrap();

        let round = session.round(1).unwrap();
        assert_eq!(round.state, RoundState::AwaitingAnswers);
        assert_eq!(round.category, Some(3));
        assert_eq!(round.questions.len(), 3);
        assert_eq!(session.current_turn(), Some(Turn::Answer));

        let session = play_round(&harness, &session.match_id, 1, 1, 1).await;
        let round = session.round(2).unwrap();
        assert_eq!(round.state, RoundState::AwaitingAnswers);
        assert_eq!(round.category, Some(3));
    }

    /// Question store whose second draw fails and whose other draws succeed.
    fn flaky_second_draw() -> MockQuestionRepository {
        let pool = bank();
        let draws = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut questions = MockQuestionRepository::new();
        questions
            .expect_draw_questions()
            .returning(move |category_id, count| {
                let draw = draws.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if draw == 1 {
                    return Err(QuestionRepositoryError::InsufficientPool {
                        category_id,
                        requested: count,
                        available: 0,
                    });
                }
                Ok(pool
                    .iter()
                    .filter(|q| q.category_id == category_id)
                    .take(count)
                    .cloned()
                    .collect())
            });
        questions
    }

    #[tokio::test]
    async fn test_failed_master_draw_keeps_completing_submission() {
        let harness = harness_with(Arc::new(flaky_second_draw()));
        let settings = MatchSettings {
            total_rounds: Some(2),
            ..MatchSettings::master(2)
        };
        let session = harness
            .service
            .create_match(&settings, vec!["alice".into()], vec!["bob".into()])
            .await
            .unwrap();
        let session = harness
            .service
            .accept_challenge(&session.match_id, "bob")
            .await
            .unwrap();
        let match_id = session.match_id.clone();

        // The round 2 draw fails inside the completing submission.
        let session = play_round(&harness, &match_id, 1, 3, 1).await;

        assert_eq!(session.round(1).unwrap().state, RoundState::Complete);
        assert_eq!(session.scores.side_a, 3);
        assert_eq!(session.scores.side_b, 1);
        assert_eq!(session.current_round, 2);
        assert_eq!(session.pending_fixed_batch(), Some((2, 2)));
        let stored = harness.service.matches.get_match(&match_id).await.unwrap();
        assert_eq!(stored.scores.side_a, 3);
        assert_eq!(stored.pending_fixed_batch(), Some((2, 2)));

        // A replayed advance draws the missing batch.
        let (outcome, session) = harness
            .service
            .advance_after_round_complete(&match_id, 1)
            .await
            .unwrap();
        assert_eq!(outcome, AdvanceOutcome::AlreadyApplied);
        let round = session.round(2).unwrap();
        assert_eq!(round.state, RoundState::AwaitingAnswers);
        assert_eq!(round.questions.len(), 3);
        assert_eq!(session.version, stored.version + 1);

        let session = play_round(&harness, &match_id, 2, 3, 0).await;
        assert_eq!(session.status, MatchStatus::Completed);
        assert_eq!(session.winner, Some(Winner::Side(Side::A)));
    }

    #[tokio::test]
    async fn test_read_fills_waiting_master_round() {
        let harness = harness_with(Arc::new(flaky_second_draw()));
        let settings = MatchSettings {
            total_rounds: Some(2),
            ..MatchSettings::master(1)
        };
        let session = harness
            .service
            .create_match(&settings, vec!["alice".into()], vec!["bob".into()])
            .await
            .unwrap();
        harness
            .service
            .accept_challenge(&session.match_id, "bob")
            .await
            .unwrap();

        let selected = harness.service.get_match(&session.match_id).await.unwrap();
        let alice = answers_for(&selected, 1, 2);
        let bob = answers_for(&selected, 1, 2);
        harness
            .service
            .submit_answers(&session.match_id, "alice", 1, &alice)
            .await
            .unwrap();
        let waiting = harness
            .service
            .submit_answers(&session.match_id, "bob", 1, &bob)
            .await
            .unwrap();
        assert_eq!(waiting.pending_fixed_batch(), Some((2, 1)));
        assert_eq!(waiting.current_turn(), None);

        let session = harness.service.get_match(&session.match_id).await.unwrap();

        assert_eq!(session.pending_fixed_batch(), None);
        assert_eq!(session.round(2).unwrap().state, RoundState::AwaitingAnswers);
        assert_eq!(session.current_turn(), Some(Turn::Answer));
    }

    #[tokio::test]
    async fn test_lock_entries_are_released_when_idle() {
        let harness = harness();
        let session = active_duel(&harness).await;
        let match_id = session.match_id.clone();
        play_round(&harness, &match_id, 1, 2, 1).await;

        let declined = harness
            .service
            .create_match(&MatchSettings::duel(), vec!["carol".into()], vec!["dave".into()])
            .await
            .unwrap();
        harness
            .service
            .decline_challenge(&declined.match_id, "dave")
            .await
            .unwrap();

        assert!(lock_map(&harness.service.locks).is_empty());
    }

    #[tokio::test]
    async fn test_waiting_caller_keeps_lock_entry() {
        let harness = harness();
        let first = harness.service.lock_match("m1").await;
        let waiter = {
            let locks = harness.service.locks.clone();
            let lock = lock_map(&locks).get("m1").cloned().unwrap();
            tokio::spawn(async move { lock.lock_owned().await })
        };
        drop(first);

        // The spawned task still references the entry.
        let guard = waiter.await.unwrap();
        assert!(lock_map(&harness.service.locks).contains_key("m1"));
        drop(guard);
        let second = harness.service.lock_match("m1").await;
        drop(second);
        assert!(lock_map(&harness.service.locks).is_empty());
    }

    #[tokio::test]
    async fn test_full_match_awards_once() {
        let harness = harness();
        let session = active_duel(&harness).await;
        let match_id = session.match_id.clone();
        for round in 1..=5 {
            play_round(&harness, &match_id, round, 2, 1).await;
        }

        let session = harness.service.get_match(&match_id).await.unwrap();
        assert_eq!(session.status, MatchStatus::Completed);
        assert_eq!(session.winner, Some(Winner::Side(Side::A)));

        // A replayed notification for the final round changes nothing.
        let replay = harness
            .service
            .advance_after_round_complete(&match_id, 5)
            .await;
        assert!(matches!(
            replay,
            Err(MatchServiceError::Rule(GameRuleError::MatchFinalized))
        ));

        // 10 vs 5 falls in the 3-5 band.
        let alice = harness.accounts.get_account("alice").await.unwrap();
        assert_eq!(alice.flash_points, 100);
        let completions = harness
            .events
            .events_for(&match_id)
            .await
            .into_iter()
            .filter(|event| matches!(event.kind, MatchEventKind::MatchCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn test_replayed_round_notification_is_absorbed() {
        let harness = harness();
        let session = active_duel(&harness).await;
        let after = play_round(&harness, &session.match_id, 1, 3, 0).await;

        let (outcome, session) = harness
            .service
            .advance_after_round_complete(&session.match_id, 1)
            .await
            .unwrap();

        assert_eq!(outcome, AdvanceOutcome::AlreadyApplied);
        assert_eq!(session, after);
        assert_eq!(session.scores.side_a, 3);
    }

    #[tokio::test]
    async fn test_surrender_mid_round() {
        let harness = harness();
        let session = active_duel(&harness).await;
        let match_id = session.match_id.clone();
        play_round(&harness, &match_id, 1, 0, 3).await;
        play_round(&harness, &match_id, 2, 0, 3).await;
        harness
            .service
            .select_category(&match_id, "alice", 3, 2)
            .await
            .unwrap();

        let session = harness.service.surrender(&match_id, "bob").await.unwrap();

        assert_eq!(session.status, MatchStatus::Completed);
        assert_eq!(session.winner, Some(Winner::Side(Side::A)));
        let late = answers_for(&session, 3, 3);
        assert!(matches!(
            harness.service.submit_answers(&match_id, "alice", 3, &late).await,
            Err(MatchServiceError::Rule(GameRuleError::MatchFinalized))
        ));
        let bob = harness.accounts.get_account("bob").await.unwrap();
        assert_eq!(bob.flash_points, 0);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_complete_round_once() {
        let harness = harness();
        let session = active_duel(&harness).await;
        let selected = harness
            .service
            .select_category(&session.match_id, "alice", 1, 1)
            .await
            .unwrap();
        let a = answers_for(&selected, 1, 3);
        let b = answers_for(&selected, 1, 2);

        let service_a = harness.service.clone();
        let service_b = harness.service.clone();
        let id_a = session.match_id.clone();
        let id_b = session.match_id.clone();
        let (first, second) = tokio::join!(
            tokio::spawn(async move { service_a.submit_answers(&id_a, "alice", 1, &a).await }),
            tokio::spawn(async move { service_b.submit_answers(&id_b, "bob", 1, &b).await }),
        );
        first.unwrap().unwrap();
        second.unwrap().unwrap();

        let stored = harness.service.get_match(&session.match_id).await.unwrap();
        assert_eq!(stored.current_round, 2);
        assert_eq!((stored.scores.side_a, stored.scores.side_b), (3, 2));
        let completions = harness
            .events
            .events_for(&session.match_id)
            .await
            .into_iter()
            .filter(|event| matches!(event.kind, MatchEventKind::RoundCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn test_lost_race_is_reported_as_concurrent_modification() {
        let harness = harness();
        let session = active_duel(&harness).await;
        let mut matches = MockMatchRepository::new();
        let stored = session.clone();
        matches
            .expect_get_match()
            .returning(move |_| Ok(stored.clone()));
        matches
            .expect_save_match()
            .returning(|_, expected| Err(MatchRepositoryError::VersionConflict { expected }));
        let progression = ProgressionService::new(
            harness.accounts.clone(),
            ScoringService::default(),
            AchievementCatalog::default(),
        );
        let service = MatchService::new(
            Arc::new(matches),
            Arc::new(InMemoryQuestionRepository::new(bank())),
            harness.events.clone(),
            progression,
        );

        let result = service.surrender(&session.match_id, "alice").await;

        assert!(matches!(
            result,
            Err(MatchServiceError::ConcurrentModification(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_the_operation() {
        let mut publisher = MockMatchEventPublisher::new();
        publisher
            .expect_publish()
            .returning(|_| Err(NotificationError::Delivery("socket closed".to_string())));
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let service = MatchService::new(
            Arc::new(InMemoryMatchRepository::new()),
            Arc::new(InMemoryQuestionRepository::new(bank())),
            Arc::new(publisher),
            ProgressionService::new(
                accounts,
                ScoringService::default(),
                AchievementCatalog::default(),
            ),
        );

        let session = service
            .create_match(&MatchSettings::duel(), vec!["alice".into()], vec!["bob".into()])
            .await
            .unwrap();
        let accepted = service
            .accept_challenge(&session.match_id, "bob")
            .await
            .unwrap();

        assert_eq!(accepted.status, MatchStatus::Active);
    }
}
