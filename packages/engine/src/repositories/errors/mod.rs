pub mod account_repository_errors;
pub mod match_repository_errors;
pub mod notification_errors;
pub mod question_repository_errors;
