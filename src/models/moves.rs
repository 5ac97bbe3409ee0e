//! Move model
//!
//! A `Move` is a proposal; it becomes a `RecordedMove` only after it has been
//! validated and written. `MoveVerdict` is the outcome of validating one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A proposed move: `player` wants to drop a token into `column`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    /// Target column, zero-based
    pub column: i64,
    /// Acting player
    pub player: String,
}

impl Move {
    /// Create a new move
    pub fn new(column: i64, player: impl Into<String>) -> Self {
        Self {
            column,
            player: player.into(),
        }
    }
}

/// A move persisted in the `moves` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedMove {
    /// Unique identifier
    pub id: i64,
    /// Owning game
    pub game_id: i64,
    /// Column the token was dropped into
    pub column: i64,
    /// Player who made the move
    pub player_id: String,
    /// When the move was recorded
    pub created_at: DateTime<Utc>,
}

/// Reason a move is not currently legal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Violation {
    /// Column index is not on the board
    #[error("column {column} is outside the board (0..{columns})")]
    ColumnOutOfRange { column: i64, columns: i64 },

    /// The game is no longer in progress
    #[error("cannot make a move in a finished game")]
    GameFinished,

    /// Someone other than the current player tried to move
    #[error("it's not {actual}'s turn, waiting for {expected}")]
    WrongTurn { expected: String, actual: String },

    /// The column already holds `rows` tokens
    #[error("column {column} is full ({rows} rows)")]
    ColumnFull { column: i64, rows: i64 },
}

impl Violation {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Violation::ColumnOutOfRange { .. } => "COLUMN_OUT_OF_RANGE",
            Violation::GameFinished => "GAME_FINISHED",
            Violation::WrongTurn { .. } => "WRONG_TURN",
            Violation::ColumnFull { .. } => "COLUMN_FULL",
        }
    }
}

/// Result of validating a move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "violation", rename_all = "lowercase")]
pub enum MoveVerdict {
    /// The move may be applied
    Legal,
    /// The move breaks a rule
    Rejected(Violation),
}

impl MoveVerdict {
    pub fn is_legal(&self) -> bool {
        matches!(self, MoveVerdict::Legal)
    }

    /// The violation, if the move was rejected
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            MoveVerdict::Legal => None,
            MoveVerdict::Rejected(violation) => Some(violation),
        }
    }
}

impl From<Violation> for MoveVerdict {
    fn from(violation: Violation) -> Self {
        MoveVerdict::Rejected(violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_codes() {
        assert_eq!(Violation::GameFinished.code(), "GAME_FINISHED");
        assert_eq!(
            Violation::ColumnFull { column: 0, rows: 6 }.code(),
            "COLUMN_FULL"
        );
        assert_eq!(
            Violation::WrongTurn {
                expected: "bob".into(),
                actual: "alice".into()
            }
            .code(),
            "WRONG_TURN"
        );
        assert_eq!(
            Violation::ColumnOutOfRange { column: 8, columns: 7 }.code(),
            "COLUMN_OUT_OF_RANGE"
        );
    }

    #[test]
    fn test_violation_display() {
        let violation = Violation::WrongTurn {
            expected: "bob".into(),
            actual: "alice".into(),
        };
        assert_eq!(violation.to_string(), "it's not alice's turn, waiting for bob");
    }

    #[test]
    fn test_violation_serializes_with_code() {
        let json = serde_json::to_value(Violation::ColumnFull { column: 2, rows: 6 }).unwrap();
        assert_eq!(json["code"], "COLUMN_FULL");
        assert_eq!(json["column"], 2);
    }

    #[test]
    fn test_verdict_helpers() {
        assert!(MoveVerdict::Legal.is_legal());
        assert!(MoveVerdict::Legal.violation().is_none());

        let rejected = MoveVerdict::from(Violation::GameFinished);
        assert!(!rejected.is_legal());
        assert_eq!(rejected.violation(), Some(&Violation::GameFinished));
    }
}
