pub mod account;
pub mod achievement;
pub mod blitz;
pub mod errors;
pub mod events;
pub mod legacy;
pub mod match_session;
pub mod question;
pub mod queue;
pub mod rewards;
pub mod round;

/// Categories are addressed by their numeric id in the question store.
pub type CategoryId = u32;
