//! Game service
//!
//! Business logic on top of [`GameRepository`]:
//! - Create games after checking the player list
//! - Fetch and list games
//! - Finish games
//! - Validate and play moves

use crate::config::GameConfig;
use crate::db::repositories::{GameRepository, RecordOutcome};
use crate::models::{Game, Move, MoveVerdict, NewGame, RecordedMove, Violation};
use crate::services::MoveValidator;
use anyhow::Context;
use std::collections::HashSet;
use std::sync::Arc;

/// Error types for game service operations
#[derive(Debug, thiserror::Error)]
pub enum GameServiceError {
    /// No game with this id (or no in-progress one, where that matters)
    #[error("Game not found: {0}")]
    NotFound(i64),

    /// The player list or a named player is not acceptable
    #[error("Invalid players: {0}")]
    InvalidPlayers(String),

    /// The game changed between validating a move and recording it
    #[error("Game {0} changed while the move was being played")]
    Conflict(i64),

    /// Reading or writing storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Result of [`GameService::play_move`]
#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    /// The move was recorded and the turn passed on
    Applied(RecordedMove),
    /// The move was not legal; nothing was written
    Rejected(Violation),
}

/// Game service
pub struct GameService {
    repo: Arc<dyn GameRepository>,
    validator: MoveValidator,
    config: GameConfig,
}

impl GameService {
    /// Create a new game service
    ///
    /// # Arguments
    /// * `repo` - Game repository for database operations
    /// * `config` - Board size and opening player for new games
    pub fn new(repo: Arc<dyn GameRepository>, config: GameConfig) -> Self {
        let validator = MoveValidator::new(repo.clone());
        Self {
            repo,
            validator,
            config,
        }
    }

    /// Create a game for `players`, in turn order
    ///
    /// # Errors
    /// - `InvalidPlayers` if the list is empty or holds a blank or repeated id
    pub async fn create_game(&self, players: Vec<String>) -> Result<Game, GameServiceError> {
        validate_players(&players)?;

        let input = NewGame::new(players)
            .with_board(self.config.columns, self.config.rows)
            .with_opening_player(self.config.opening_player);

        let game = self.repo.create(&input).await?;
        Ok(game)
    }

    /// Get a game with its players
    pub async fn get_game(&self, id: i64) -> Result<Game, GameServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or(GameServiceError::NotFound(id))
    }

    /// List in-progress games. Players are not loaded.
    pub async fn list_active_games(&self) -> Result<Vec<Game>, GameServiceError> {
        Ok(self.repo.list_active().await?)
    }

    /// List the moves of a game in the order they were played
    pub async fn list_moves(&self, id: i64) -> Result<Vec<RecordedMove>, GameServiceError> {
        // Distinguish an unknown game from one without moves
        self.get_game(id).await?;
        Ok(self.repo.list_moves(id).await?)
    }

    /// Finish an in-progress game, optionally naming the winner
    ///
    /// # Errors
    /// - `NotFound` if there is no in-progress game with this id
    /// - `InvalidPlayers` if `winner` is not one of the game's players
    pub async fn finish_game(
        &self,
        id: i64,
        winner: Option<&str>,
    ) -> Result<Game, GameServiceError> {
        let game = self.get_game(id).await?;
        if !game.is_in_progress() {
            return Err(GameServiceError::NotFound(id));
        }
        if let Some(winner) = winner {
            if !game.players.iter().any(|p| p == winner) {
                return Err(GameServiceError::InvalidPlayers(format!(
                    "'{}' does not play in game {}",
                    winner, id
                )));
            }
        }

        if !self.repo.finish(id, winner).await? {
            // Finished by someone else in the meantime
            return Err(GameServiceError::NotFound(id));
        }

        self.get_game(id).await
    }

    /// Check whether `mv` is currently legal in game `id`. Writes nothing.
    pub async fn validate_move(&self, id: i64, mv: &Move) -> Result<MoveVerdict, GameServiceError> {
        self.validator.validate(id, mv).await
    }

    /// Validate `mv` and, if legal, record it and pass the turn on
    ///
    /// # Errors
    /// - `NotFound` if the game does not exist
    /// - `Conflict` if another move or a finish landed after validation
    pub async fn play_move(&self, id: i64, mv: &Move) -> Result<PlayOutcome, GameServiceError> {
        let game = self.get_game(id).await?;

        if let MoveVerdict::Rejected(violation) = self.validator.validate_loaded(&game, mv).await? {
            return Ok(PlayOutcome::Rejected(violation));
        }

        let outcome = self
            .repo
            .record_move(id, game.current_player_index, mv)
            .await
            .with_context(|| format!("Failed to play move in game {}", id))?;

        match outcome {
            RecordOutcome::Recorded(recorded) => Ok(PlayOutcome::Applied(recorded)),
            RecordOutcome::ColumnFull => Ok(PlayOutcome::Rejected(Violation::ColumnFull {
                column: mv.column,
                rows: game.rows,
            })),
            RecordOutcome::Conflict => {
                tracing::warn!(game_id = id, player = %mv.player, "Move lost a race");
                Err(GameServiceError::Conflict(id))
            }
        }
    }
}

fn validate_players(players: &[String]) -> Result<(), GameServiceError> {
    if players.is_empty() {
        return Err(GameServiceError::InvalidPlayers(
            "A game needs at least one player".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(players.len());
    for player in players {
        if player.trim().is_empty() {
            return Err(GameServiceError::InvalidPlayers(
                "Player ids cannot be blank".to_string(),
            ));
        }
        if !seen.insert(player.as_str()) {
            return Err(GameServiceError::InvalidPlayers(format!(
                "Player '{}' is listed more than once",
                player
            )));
        }
    }
    Ok(())
}
