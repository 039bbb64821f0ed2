#[derive(Debug)]
pub enum AccountRepositoryError {
    /// Every conditional write attempt lost against a concurrent update.
    Contention { attempts: u32 },
    Serialization(String),
    DynamoDb(String),
}

impl std::fmt::Display for AccountRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountRepositoryError::Contention { attempts } => write!(
                f,
                "Account update kept conflicting after {} attempts",
                attempts
            ),
            AccountRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            AccountRepositoryError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
        }
    }
}

impl std::error::Error for AccountRepositoryError {}
