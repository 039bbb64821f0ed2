#[derive(Debug)]
pub enum MatchRepositoryError {
    NotFound,
    AlreadyExists,
    /// The stored version no longer matches the one the caller read.
    VersionConflict { expected: u64 },
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for MatchRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRepositoryError::NotFound => write!(f, "Match not found"),
            MatchRepositoryError::AlreadyExists => write!(f, "Match already exists"),
            MatchRepositoryError::VersionConflict { expected } => write!(
                f,
                "Match was modified concurrently (expected version {})",
                expected
            ),
            MatchRepositoryError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            MatchRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for MatchRepositoryError {}
