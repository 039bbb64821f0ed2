use std::path::Path;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use rand::seq::SliceRandom;
use serde_dynamo::from_items;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::models::{question::Question, CategoryId};
use crate::repositories::errors::question_repository_errors::QuestionRepositoryError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Draws exactly `count` distinct questions from `category_id`, or fails
    /// with `InsufficientPool`. Never returns a short batch.
    async fn draw_questions(
        &self,
        category_id: CategoryId,
        count: usize,
    ) -> Result<Vec<Question>, QuestionRepositoryError>;
}

/// Picks `count` random questions out of the eligible part of `pool`.
fn sample(
    pool: Vec<Question>,
    category_id: CategoryId,
    count: usize,
) -> Result<Vec<Question>, QuestionRepositoryError> {
    let eligible: Vec<Question> = pool
        .into_iter()
        .filter(|q| q.category_id == category_id && !q.incorrect_answers.is_empty())
        .collect();
    if eligible.len() < count {
        return Err(QuestionRepositoryError::InsufficientPool {
            category_id,
            requested: count,
            available: eligible.len(),
        });
    }
    let mut rng = rand::thread_rng();
    Ok(eligible
        .choose_multiple(&mut rng, count)
        .cloned()
        .collect())
}

/// Question bank held in memory, optionally loaded from a JSON array of
/// questions.
pub struct InMemoryQuestionRepository {
    questions: Vec<Question>,
}

impl InMemoryQuestionRepository {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn from_json(json: &str) -> Result<Self, QuestionRepositoryError> {
        let questions: Vec<Question> = serde_json::from_str(json)
            .map_err(|e| QuestionRepositoryError::Serialization(e.to_string()))?;
        Ok(Self::new(questions))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, QuestionRepositoryError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| QuestionRepositoryError::Io(format!("{}: {}", path.display(), e)))?;
        let repository = Self::from_json(&json)?;
        info!(
            "Loaded {} questions from {}",
            repository.questions.len(),
            path.display()
        );
        Ok(repository)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[async_trait]
impl QuestionRepository for InMemoryQuestionRepository {
    async fn draw_questions(
        &self,
        category_id: CategoryId,
        count: usize,
    ) -> Result<Vec<Question>, QuestionRepositoryError> {
        sample(self.questions.clone(), category_id, count)
    }
}

/// Questions table partitioned by `category_id` with `question_id` as the
/// sort key.
pub struct DynamoDbQuestionRepository {
    pub client: Client,
    pub table_name: String,
}

impl DynamoDbQuestionRepository {
    pub fn new(client: Client, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }
}

#[async_trait]
impl QuestionRepository for DynamoDbQuestionRepository {
    async fn draw_questions(
        &self,
        category_id: CategoryId,
        count: usize,
    ) -> Result<Vec<Question>, QuestionRepositoryError> {
        let mut pool: Vec<Question> = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("category_id = :category_id")
                .expression_attribute_values(
                    ":category_id",
                    AttributeValue::N(category_id.to_string()),
                )
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| QuestionRepositoryError::DynamoDb(e.to_string()))?;

            if let Some(items) = output.items {
                let page: Vec<Question> = from_items(items)
                    .map_err(|e| QuestionRepositoryError::Serialization(e.to_string()))?;
                pool.extend(page);
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        debug!(
            "Category {} pool holds {} questions, drawing {}",
            category_id,
            pool.len(),
            count
        );
        sample(pool, category_id, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> InMemoryQuestionRepository {
        InMemoryQuestionRepository::new(vec![
            Question::new("h1", 1, "Year of the Norman conquest?", "1066", &["1067", "1215"]),
            Question::new("h2", 1, "First Roman emperor?", "Augustus", &["Nero", "Caesar"]),
            Question::new("h3", 1, "Wall that fell in 1989?", "Berlin", &["Hadrian's"]),
            Question::new("h4", 1, "No options at all", "x", &[]),
            Question::new("s1", 2, "Chemical symbol for gold?", "Au", &["Ag", "Gd"]),
        ])
    }

    #[tokio::test]
    async fn test_draws_distinct_questions_from_category() {
        let questions = bank().draw_questions(1, 3).await.unwrap();

        assert_eq!(questions.len(), 3);
        assert!(questions.iter().all(|q| q.category_id == 1));
        let mut ids: Vec<&str> = questions.iter().map(|q| q.question_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_short_pool_is_reported_not_truncated() {
        let result = bank().draw_questions(2, 3).await;

        assert!(matches!(
            result,
            Err(QuestionRepositoryError::InsufficientPool {
                category_id: 2,
                requested: 3,
                available: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_questions_without_incorrect_options_are_not_eligible() {
        let result = bank().draw_questions(1, 4).await;

        assert!(matches!(
            result,
            Err(QuestionRepositoryError::InsufficientPool { available: 3, .. })
        ));
    }

    #[test]
    fn test_bank_loads_from_json() {
        let json = r#"[{"question_id":"g1","category_id":4,"prompt":"Tallest mountain?",
            "correct_answer":"Everest","incorrect_answers":["K2","Denali"]}]"#;

        let repository = InMemoryQuestionRepository::from_json(json).unwrap();

        assert_eq!(repository.len(), 1);
    }

    #[test]
    fn test_malformed_bank_is_rejected() {
        assert!(matches!(
            InMemoryQuestionRepository::from_json("{not json"),
            Err(QuestionRepositoryError::Serialization(_))
        ));
    }
}
