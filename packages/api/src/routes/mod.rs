pub mod accounts;
pub mod health;
pub mod matches;
pub mod queue;
pub mod solo;
