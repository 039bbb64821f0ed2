use crate::models::CategoryId;

#[derive(Debug)]
pub enum QuestionRepositoryError {
    /// The category holds fewer eligible questions than were requested.
    InsufficientPool {
        category_id: CategoryId,
        requested: usize,
        available: usize,
    },
    Serialization(String),
    DynamoDb(String),
    Io(String),
}

impl std::fmt::Display for QuestionRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionRepositoryError::InsufficientPool {
                category_id,
                requested,
                available,
            } => write!(
                f,
                "Category {} has {} questions but {} were requested",
                category_id, available, requested
            ),
            QuestionRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            QuestionRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            QuestionRepositoryError::Io(msg) => write!(f, "Question bank error: {}", msg),
        }
    }
}

impl std::error::Error for QuestionRepositoryError {}
