pub mod account_repository;
pub mod errors;
pub mod match_repository;
pub mod notification_repository;
pub mod question_repository;
