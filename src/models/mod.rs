//! Data models
//!
//! Plain data structures shared by the repository and service layers:
//! - `Game` and its lifecycle `GameState`
//! - `Move` proposals, `RecordedMove` rows and validation verdicts

mod game;
mod moves;

pub use game::{Game, GameState, NewGame};
pub use moves::{Move, MoveVerdict, RecordedMove, Violation};
