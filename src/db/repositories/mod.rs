//! Database repositories
//!
//! Repository pattern implementations for database access.

pub mod game;

pub use game::{GameRepository, RecordOutcome, SqlxGameRepository};
