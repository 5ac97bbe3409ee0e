//! Business logic services
//!
//! - `GameService`: creating, loading, listing, finishing and playing games
//! - `MoveValidator`: read-only legality check of a proposed move

pub mod game;
pub mod move_validator;

pub use game::{GameService, GameServiceError, PlayOutcome};
pub use move_validator::MoveValidator;
