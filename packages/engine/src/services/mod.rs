pub mod errors;
pub mod match_service;
pub mod matchmaking_service;
pub mod progression_service;
pub mod scoring_service;
