use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    models::{
        account::{Account, AccountChange, AccountUpdate, CategoryStats, StatChange},
        achievement::{AchievementCatalog, TrackedStat},
        blitz::BlitzSession,
        match_session::{MatchSession, Side, Winner},
        rewards::MatchRewards,
        round::RoundState,
    },
    repositories::account_repository::AccountRepository,
    services::{
        errors::progression_service_errors::ProgressionServiceError,
        scoring_service::ScoringService,
    },
};

/// Turns rewards and match/session results into account changes.
#[derive(Clone)]
pub struct ProgressionService {
    repository: Arc<dyn AccountRepository + Send + Sync>,
    scoring: ScoringService,
    catalog: Arc<AchievementCatalog>,
}

impl ProgressionService {
    pub fn new(
        repository: Arc<dyn AccountRepository + Send + Sync>,
        scoring: ScoringService,
        catalog: AchievementCatalog,
    ) -> Self {
        ProgressionService {
            repository,
            scoring,
            catalog: Arc::new(catalog),
        }
    }

    pub fn scoring(&self) -> &ScoringService {
        &self.scoring
    }

    pub async fn get_account(&self, player_id: &str) -> Result<Account, ProgressionServiceError> {
        Ok(self.repository.get_account(player_id).await?)
    }

    /// Stats and reward a side's players receive for a finished match.
    pub fn match_update(session: &MatchSession, side: Side, rewards: &MatchRewards) -> AccountUpdate {
        let reward = match side {
            Side::A => rewards.side_a,
            Side::B => rewards.side_b,
        };

        let mut correct_answers = 0u64;
        let mut perfect_rounds = 0u64;
        let mut categories = Vec::new();
        for round in &session.rounds {
            let answers = match round.answers(side) {
                Some(answers) => answers,
                None => continue,
            };
            let correct = answers.iter().filter(|answer| answer.correct).count() as u64;
            correct_answers += correct;
            if round.state == RoundState::Complete && correct as usize == round.question_count {
                perfect_rounds += 1;
            }
            if let Some(category) = round.category {
                categories.push((
                    category,
                    CategoryStats {
                        answered: answers.len() as u64,
                        correct,
                    },
                ));
            }
        }

        let mut stats = vec![
            (TrackedStat::MatchesPlayed, StatChange::Increment(1)),
            (TrackedStat::CorrectAnswers, StatChange::Increment(correct_answers)),
            (TrackedStat::PerfectRounds, StatChange::Increment(perfect_rounds)),
        ];
        if session.winner == Some(Winner::Side(side)) {
            stats.push((TrackedStat::MatchesWon, StatChange::Increment(1)));
        }

        AccountUpdate {
            reward,
            stats,
            categories,
        }
    }

    /// Applies `rewards` to every player of a completed match. A failed
    /// account does not stop the others from being credited.
    pub async fn award_match(
        &self,
        session: &MatchSession,
        rewards: &MatchRewards,
    ) -> Result<Vec<AccountChange>, ProgressionServiceError> {
        let mut changes = Vec::new();
        let mut failures = Vec::new();
        for side in [Side::A, Side::B] {
            let update = Self::match_update(session, side, rewards);
            for player_id in session.players(side) {
                let change = match self
                    .repository
                    .update_account(player_id, &update, &self.catalog)
                    .await
                {
                    Ok(change) => change,
                    Err(e) => {
                        warn!(
                            "Could not credit player {} for match {}: {}",
                            player_id, session.match_id, e
                        );
                        failures.push((player_id.clone(), e));
                        continue;
                    }
                };
                info!(
                    "Player {} earned {} FP / {} XP from match {} (level {} -> {})",
                    player_id,
                    change.reward.flash_points,
                    change.reward.experience,
                    session.match_id,
                    change.level_before,
                    change.account.level
                );
                changes.push(change);
            }
        }
        if !failures.is_empty() {
            return Err(ProgressionServiceError::AwardIncomplete {
                match_id: session.match_id.clone(),
                failures,
            });
        }
        Ok(changes)
    }

    pub async fn award_blitz(
        &self,
        player_id: &str,
        session: &BlitzSession,
    ) -> Result<AccountChange, ProgressionServiceError> {
        session.validate()?;
        let update = AccountUpdate {
            reward: self.scoring.blitz_rewards(session),
            stats: vec![
                (TrackedStat::BlitzSessions, StatChange::Increment(1)),
                (TrackedStat::BlitzBestScore, StatChange::Max(session.score as u64)),
                (
                    TrackedStat::CorrectAnswers,
                    StatChange::Increment(session.correct_answers as u64),
                ),
            ],
            categories: vec![],
        };

        let change = self
            .repository
            .update_account(player_id, &update, &self.catalog)
            .await?;
        info!(
            "Player {} earned {} FP / {} XP from a blitz run, {} milestone(s) unlocked",
            player_id,
            change.reward.flash_points,
            change.reward.experience,
            change.unlocked.len()
        );
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        errors::GameRuleError,
        match_session::MatchSettings,
        question::RoundQuestion,
        rewards::RewardDelta,
        round::SubmittedAnswer,
    };
    use crate::repositories::{
        account_repository::{InMemoryAccountRepository, MockAccountRepository},
        errors::account_repository_errors::AccountRepositoryError,
    };

    fn service(repository: Arc<dyn AccountRepository + Send + Sync>) -> ProgressionService {
        ProgressionService::new(
            repository,
            ScoringService::default(),
            AchievementCatalog::default(),
        )
    }

    fn batch() -> Vec<RoundQuestion> {
        (0..3)
            .map(|i| RoundQuestion {
                question_id: format!("q{}", i),
                prompt: format!("Question {}", i),
                options: vec!["a".into(), "b".into()],
                correct_option: 0,
            })
            .collect()
    }

    fn one_round_match() -> MatchSession {
        let settings = MatchSettings {
            total_rounds: Some(1),
            ..MatchSettings::duel()
        };
        let mut session =
            MatchSession::new(&settings, vec!["alice".into()], vec!["bob".into()]).unwrap();
        session.accept(Side::B).unwrap();
        session.select_category(Side::A, 1, 9, batch()).unwrap();
        let perfect = [SubmittedAnswer::choose(0, 900); 3];
        let one_right = [
            SubmittedAnswer::choose(0, 900),
            SubmittedAnswer::choose(1, 900),
            SubmittedAnswer::timeout(10_000),
        ];
        session.submit_answers(Side::A, 1, &perfect).unwrap();
        session.submit_answers(Side::B, 1, &one_right).unwrap();
        session.advance_after_round_complete(1).unwrap();
        session
    }

    #[test]
    fn test_match_update_collects_side_stats() {
        let session = one_round_match();
        let rewards = ScoringService::default().match_rewards(&session).unwrap();

        let update = ProgressionService::match_update(&session, Side::A, &rewards);

        assert_eq!(update.reward, RewardDelta::new(70, 90));
        assert!(update
            .stats
            .contains(&(TrackedStat::CorrectAnswers, StatChange::Increment(3))));
        assert!(update
            .stats
            .contains(&(TrackedStat::PerfectRounds, StatChange::Increment(1))));
        assert!(update
            .stats
            .contains(&(TrackedStat::MatchesWon, StatChange::Increment(1))));
        assert_eq!(
            update.categories,
            vec![(9, CategoryStats { answered: 3, correct: 3 })]
        );
    }

    #[test]
    fn test_loser_gets_no_win() {
        let session = one_round_match();
        let rewards = ScoringService::default().match_rewards(&session).unwrap();

        let update = ProgressionService::match_update(&session, Side::B, &rewards);

        assert!(!update
            .stats
            .iter()
            .any(|(stat, _)| *stat == TrackedStat::MatchesWon));
        assert!(update
            .stats
            .contains(&(TrackedStat::PerfectRounds, StatChange::Increment(0))));
    }

    #[tokio::test]
    async fn test_award_match_updates_every_player() {
        let repository = Arc::new(InMemoryAccountRepository::new());
        let service = service(repository.clone());
        let session = one_round_match();
        let rewards = service.scoring().match_rewards(&session).unwrap();

        let changes = service.award_match(&session, &rewards).await.unwrap();

        assert_eq!(changes.len(), 2);
        let alice = repository.get_account("alice").await.unwrap();
        let bob = repository.get_account("bob").await.unwrap();
        assert_eq!(alice.flash_points, 70);
        assert_eq!(alice.experience, 90);
        // Loser's experience loss is floored at level 1 with 0 XP.
        assert_eq!(bob.flash_points, 30);
        assert_eq!(bob.experience, 0);
        assert_eq!(bob.level, 1);
    }

    #[tokio::test]
    async fn test_failed_account_does_not_block_the_rest() {
        let mut repository = MockAccountRepository::new();
        repository
            .expect_update_account()
            .times(2)
            .returning(|player_id, update, _| match player_id {
                "alice" => Err(AccountRepositoryError::Contention { attempts: 3 }),
                _ => Ok(AccountChange {
                    account: Account::new(player_id),
                    level_before: 1,
                    reward: update.reward,
                    unlocked: vec![],
                }),
            });
        let service = service(Arc::new(repository));
        let session = one_round_match();
        let rewards = service.scoring().match_rewards(&session).unwrap();

        let result = service.award_match(&session, &rewards).await;

        match result {
            Err(ProgressionServiceError::AwardIncomplete { match_id, failures }) => {
                assert_eq!(match_id, session.match_id);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "alice");
            }
            other => panic!("expected an incomplete award, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_award_blitz_tracks_best_score() {
        let repository = Arc::new(InMemoryAccountRepository::new());
        let service = service(repository.clone());
        let run = BlitzSession {
            correct_answers: 10,
            questions_answered: 10,
            score: 120,
            best_streak: 10,
            lives_remaining: 3,
        };

        let change = service.award_blitz("alice", &run).await.unwrap();

        assert_eq!(change.account.stat(TrackedStat::BlitzBestScore), 120);
        assert_eq!(change.account.stat(TrackedStat::BlitzSessions), 1);
        // 120 + streak 25 + accuracy 30, plus blitz_master bronze and silver (25 + 50).
        assert_eq!(change.account.flash_points, 250);
        assert_eq!(change.unlocked.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_blitz_run_is_rejected_before_storage() {
        let mut repository = MockAccountRepository::new();
        repository.expect_update_account().never();
        let service = service(Arc::new(repository));
        let run = BlitzSession {
            correct_answers: 11,
            questions_answered: 10,
            score: 0,
            best_streak: 0,
            lives_remaining: 0,
        };

        let result = service.award_blitz("alice", &run).await;

        assert!(matches!(
            result,
            Err(ProgressionServiceError::Rule(GameRuleError::InvalidSettings(_)))
        ));
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let mut repository = MockAccountRepository::new();
        repository
            .expect_update_account()
            .returning(|_, _, _| Err(AccountRepositoryError::DynamoDb("throttled".to_string())));
        let service = service(Arc::new(repository));
        let run = BlitzSession {
            correct_answers: 1,
            questions_answered: 2,
            score: 10,
            best_streak: 1,
            lives_remaining: 0,
        };

        assert!(matches!(
            service.award_blitz("alice", &run).await,
            Err(ProgressionServiceError::RepositoryError(_))
        ));
    }
}
