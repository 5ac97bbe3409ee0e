//! Game model
//!
//! This module provides:
//! - `Game` entity, one persisted match of the column-drop game
//! - `GameState` enum for the match lifecycle
//! - `NewGame` input used when creating a game

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Game entity
///
/// Turn indexing is zero-based: the player whose turn it is is always
/// `players[current_player_index]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Unique identifier, assigned by the database
    pub id: i64,
    /// Number of players, equal to `players.len()` when players are loaded
    pub player_count: i64,
    /// Zero-based index into `players` of the player to move
    pub current_player_index: i64,
    /// Lifecycle state
    pub state: GameState,
    /// Winning player, absent while the game is in progress
    pub winner_id: Option<String>,
    /// Board width
    pub columns: i64,
    /// Board height, i.e. how many tokens fit in a column
    pub rows: i64,
    /// Players in turn order. Left empty by listing queries.
    #[serde(default)]
    pub players: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Game {
    /// Whether the game still accepts moves
    pub fn is_in_progress(&self) -> bool {
        self.state == GameState::InProgress
    }

    /// The player whose turn it is.
    ///
    /// Returns `None` when players were not loaded or the stored index is out
    /// of range.
    pub fn current_player(&self) -> Option<&str> {
        usize::try_from(self.current_player_index)
            .ok()
            .and_then(|index| self.players.get(index))
            .map(String::as_str)
    }

    /// Whether `column` lies on the board
    pub fn contains_column(&self, column: i64) -> bool {
        (0..self.columns).contains(&column)
    }
}

/// Game lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    /// Moves are accepted
    #[default]
    InProgress,
    /// Terminal, no further moves
    Finished,
}

impl GameState {
    /// Convert state to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::InProgress => "IN_PROGRESS",
            GameState::Finished => "FINISHED",
        }
    }

    /// Parse state from database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(GameState::InProgress),
            "FINISHED" => Some(GameState::Finished),
            _ => None,
        }
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating a new game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGame {
    /// Players in turn order
    pub players: Vec<String>,
    /// Zero-based index of the opening player
    pub current_player_index: i64,
    /// Board width
    pub columns: i64,
    /// Board height
    pub rows: i64,
}

impl NewGame {
    /// Standard board size
    pub const DEFAULT_COLUMNS: i64 = 7;
    pub const DEFAULT_ROWS: i64 = 6;

    /// Create input for a standard 7x6 game where the second listed player
    /// opens (wrapping to the first for a single-player game).
    pub fn new(players: Vec<String>) -> Self {
        let current_player_index = opening_index(1, players.len());
        Self {
            players,
            current_player_index,
            columns: Self::DEFAULT_COLUMNS,
            rows: Self::DEFAULT_ROWS,
        }
    }

    /// Set the board dimensions
    pub fn with_board(mut self, columns: i64, rows: i64) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }

    /// Set the opening player, reduced modulo the player count
    pub fn with_opening_player(mut self, index: i64) -> Self {
        self.current_player_index = opening_index(index, self.players.len());
        self
    }
}

fn opening_index(index: i64, player_count: usize) -> i64 {
    match i64::try_from(player_count) {
        Ok(count) if count > 0 => index.rem_euclid(count),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_game(players: &[&str], current: i64) -> Game {
        let now = Utc::now();
        Game {
            id: 1,
            player_count: players.len() as i64,
            current_player_index: current,
            state: GameState::InProgress,
            winner_id: None,
            columns: 7,
            rows: 6,
            players: players.iter().map(|p| p.to_string()).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_game_state_db_strings() {
        assert_eq!(GameState::InProgress.as_str(), "IN_PROGRESS");
        assert_eq!(GameState::Finished.to_string(), "FINISHED");
        assert_eq!(GameState::from_str("IN_PROGRESS"), Some(GameState::InProgress));
        assert_eq!(GameState::from_str("FINISHED"), Some(GameState::Finished));
        assert_eq!(GameState::from_str("in_progress"), None);
    }

    #[test]
    fn test_game_state_serializes_as_db_string() {
        let json = serde_json::to_string(&GameState::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn test_new_game_defaults() {
        let input = NewGame::new(vec!["alice".into(), "bob".into(), "carol".into()]);
        assert_eq!(input.current_player_index, 1);
        assert_eq!(input.columns, 7);
        assert_eq!(input.rows, 6);
    }

    #[test]
    fn test_new_game_single_player_opens_at_zero() {
        let input = NewGame::new(vec!["solo".into()]);
        assert_eq!(input.current_player_index, 0);
    }

    #[test]
    fn test_opening_player_wraps() {
        let input = NewGame::new(vec!["a".into(), "b".into()]).with_opening_player(5);
        assert_eq!(input.current_player_index, 1);
    }

    #[test]
    fn test_current_player_is_zero_based() {
        let game = sample_game(&["alice", "bob", "carol"], 1);
        assert_eq!(game.current_player(), Some("bob"));
    }

    #[test]
    fn test_current_player_out_of_range() {
        let game = sample_game(&["alice"], 3);
        assert_eq!(game.current_player(), None);
        let unloaded = sample_game(&[], 0);
        assert_eq!(unloaded.current_player(), None);
    }

    #[test]
    fn test_contains_column() {
        let game = sample_game(&["alice", "bob"], 0);
        assert!(game.contains_column(0));
        assert!(game.contains_column(6));
        assert!(!game.contains_column(7));
        assert!(!game.contains_column(-1));
    }
}
