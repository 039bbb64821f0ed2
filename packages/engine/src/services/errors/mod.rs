pub mod match_service_errors;
pub mod matchmaking_service_errors;
pub mod progression_service_errors;
