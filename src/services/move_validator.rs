//! Move validator
//!
//! Decides, without writing anything, whether a proposed move is currently
//! legal. Checks run in this order and stop at the first failure:
//!
//! 1. the game is still in progress
//! 2. the column lies on the board
//! 3. the acting player is `players[current_player_index]` (zero-based)
//! 4. the column holds fewer than `rows` recorded moves
//!
//! Validating the same move against an unchanged game always gives the same
//! verdict.

use crate::db::repositories::GameRepository;
use crate::models::{Game, Move, MoveVerdict, Violation};
use crate::services::GameServiceError;
use anyhow::Context;
use std::sync::Arc;

/// Validates moves against games loaded from a [`GameRepository`]
pub struct MoveValidator {
    repo: Arc<dyn GameRepository>,
}

impl MoveValidator {
    /// Create a validator reading from the given repository
    pub fn new(repo: Arc<dyn GameRepository>) -> Self {
        Self { repo }
    }

    /// Load game `game_id` and validate `mv` against it.
    ///
    /// # Errors
    /// - `NotFound` if the game does not exist
    /// - `Storage` if the game or its move count cannot be read
    pub async fn validate(&self, game_id: i64, mv: &Move) -> Result<MoveVerdict, GameServiceError> {
        let game = self
            .repo
            .get_by_id(game_id)
            .await
            .with_context(|| format!("Failed to load game {} for validation", game_id))?
            .ok_or(GameServiceError::NotFound(game_id))?;

        self.validate_loaded(&game, mv).await
    }

    /// Validate `mv` against an already loaded game.
    ///
    /// Only counts moves when every earlier check passes.
    pub async fn validate_loaded(
        &self,
        game: &Game,
        mv: &Move,
    ) -> Result<MoveVerdict, GameServiceError> {
        if game.is_in_progress() && game.current_player().is_none() {
            return Err(anyhow::anyhow!(
                "Game {} has turn index {} outside its {} players",
                game.id,
                game.current_player_index,
                game.players.len()
            )
            .into());
        }

        if let Some(violation) = check_before_count(game, mv) {
            tracing::debug!(game_id = game.id, code = violation.code(), "Move rejected");
            return Ok(MoveVerdict::Rejected(violation));
        }

        let filled = self
            .repo
            .count_moves_in_column(game.id, mv.column)
            .await
            .with_context(|| {
                format!(
                    "Failed to count moves in column {} of game {}",
                    mv.column, game.id
                )
            })?;

        let verdict = check(game, mv, filled);
        if let Some(violation) = verdict.violation() {
            tracing::debug!(game_id = game.id, code = violation.code(), "Move rejected");
        }
        Ok(verdict)
    }
}

/// Validate `mv` against `game`, given how many moves its column already holds
pub fn check(game: &Game, mv: &Move, moves_in_column: i64) -> MoveVerdict {
    if let Some(violation) = check_before_count(game, mv) {
        return MoveVerdict::Rejected(violation);
    }
    if moves_in_column >= game.rows {
        return MoveVerdict::Rejected(Violation::ColumnFull {
            column: mv.column,
            rows: game.rows,
        });
    }
    MoveVerdict::Legal
}

// Finished, column range and turn: every check that needs no move count.
fn check_before_count(game: &Game, mv: &Move) -> Option<Violation> {
    if !game.is_in_progress() {
        return Some(Violation::GameFinished);
    }
    if !game.contains_column(mv.column) {
        return Some(Violation::ColumnOutOfRange {
            column: mv.column,
            columns: game.columns,
        });
    }
    match game.current_player() {
        Some(expected) if expected == mv.player => None,
        expected => Some(Violation::WrongTurn {
            expected: expected.unwrap_or_default().to_string(),
            actual: mv.player.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{RecordOutcome, SqlxGameRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{GameState, NewGame, RecordedMove};
    use async_trait::async_trait;
    use chrono::Utc;

    fn game(players: &[&str], current: i64, state: GameState) -> Game {
        let now = Utc::now();
        Game {
            id: 7,
            player_count: players.len() as i64,
            current_player_index: current,
            state,
            winner_id: None,
            columns: 7,
            rows: 6,
            players: players.iter().map(|p| p.to_string()).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup_validator() -> (Arc<dyn GameRepository>, MoveValidator) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxGameRepository::boxed(pool);
        (repo.clone(), MoveValidator::new(repo))
    }

    // ========================================================================
    // Pure checks
    // ========================================================================

    #[test]
    fn test_check_legal_move() {
        let game = game(&["alice", "bob", "carol"], 1, GameState::InProgress);
        assert_eq!(check(&game, &Move::new(1, "bob"), 0), MoveVerdict::Legal);
    }

    #[test]
    fn test_check_turn_index_is_zero_based() {
        let game = game(&["alice", "bob", "carol"], 1, GameState::InProgress);

        let verdict = check(&game, &Move::new(1, "alice"), 0);

        assert_eq!(
            verdict,
            MoveVerdict::Rejected(Violation::WrongTurn {
                expected: "bob".into(),
                actual: "alice".into(),
            })
        );
    }

    #[test]
    fn test_check_finished_game_rejects_everything() {
        let game = game(&["alice", "bob"], 1, GameState::Finished);

        for mv in [Move::new(0, "bob"), Move::new(0, "alice"), Move::new(99, "bob")] {
            assert_eq!(
                check(&game, &mv, 6),
                MoveVerdict::Rejected(Violation::GameFinished)
            );
        }
    }

    #[test]
    fn test_check_column_out_of_range() {
        let game = game(&["alice", "bob"], 1, GameState::InProgress);

        for column in [-1, 7, 8] {
            assert_eq!(
                check(&game, &Move::new(column, "bob"), 0),
                MoveVerdict::Rejected(Violation::ColumnOutOfRange { column, columns: 7 })
            );
        }
    }

    #[test]
    fn test_check_full_column() {
        let game = game(&["alice", "bob"], 0, GameState::InProgress);

        assert_eq!(check(&game, &Move::new(3, "alice"), 5), MoveVerdict::Legal);
        assert_eq!(
            check(&game, &Move::new(3, "alice"), 6),
            MoveVerdict::Rejected(Violation::ColumnFull { column: 3, rows: 6 })
        );
    }

    // ========================================================================
    // Validation against storage
    // ========================================================================

    #[tokio::test]
    async fn test_validate_fresh_game() {
        let (repo, validator) = setup_validator().await;
        let created = repo
            .create(&NewGame::new(vec!["alice".into(), "bob".into(), "carol".into()]))
            .await
            .unwrap();

        let legal = validator.validate(created.id, &Move::new(1, "bob")).await.unwrap();
        assert_eq!(legal, MoveVerdict::Legal);

        let out_of_range = validator.validate(created.id, &Move::new(8, "bob")).await.unwrap();
        assert_eq!(
            out_of_range.violation().map(Violation::code),
            Some("COLUMN_OUT_OF_RANGE")
        );
    }

    #[tokio::test]
    async fn test_validate_is_idempotent() {
        let (repo, validator) = setup_validator().await;
        let created = repo
            .create(&NewGame::new(vec!["alice".into(), "bob".into()]))
            .await
            .unwrap();
        let mv = Move::new(2, "alice");

        let first = validator.validate(created.id, &mv).await.unwrap();
        let second = validator.validate(created.id, &mv).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.count_moves_in_column(created.id, 2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_validate_full_column() {
        let (repo, validator) = setup_validator().await;
        let created = repo
            .create(&NewGame::new(vec!["a".into(), "b".into()]))
            .await
            .unwrap();

        let mut turn = created.current_player_index;
        for _ in 0..created.rows {
            let player = created.players[turn as usize].clone();
            let outcome = repo.record_move(created.id, turn, &Move::new(4, player)).await.unwrap();
            assert!(matches!(outcome, RecordOutcome::Recorded(_)));
            turn = (turn + 1) % 2;
        }

        let current = created.players[turn as usize].clone();
        let verdict = validator.validate(created.id, &Move::new(4, current.clone())).await.unwrap();
        assert_eq!(
            verdict,
            MoveVerdict::Rejected(Violation::ColumnFull { column: 4, rows: 6 })
        );

        let elsewhere = validator.validate(created.id, &Move::new(5, current)).await.unwrap();
        assert_eq!(elsewhere, MoveVerdict::Legal);
    }

    #[tokio::test]
    async fn test_validate_finished_game() {
        let (repo, validator) = setup_validator().await;
        let created = repo
            .create(&NewGame::new(vec!["a".into(), "b".into()]))
            .await
            .unwrap();
        repo.finish(created.id, Some("a")).await.unwrap();

        let verdict = validator.validate(created.id, &Move::new(0, "b")).await.unwrap();

        assert_eq!(verdict, MoveVerdict::Rejected(Violation::GameFinished));
    }

    #[tokio::test]
    async fn test_validate_missing_game_is_not_found() {
        let (_repo, validator) = setup_validator().await;

        let result = validator.validate(404, &Move::new(0, "a")).await;

        assert!(matches!(result, Err(GameServiceError::NotFound(404))));
    }

    struct UnavailableRepository;

    #[async_trait]
    impl GameRepository for UnavailableRepository {
        async fn create(&self, _new_game: &NewGame) -> anyhow::Result<Game> {
            anyhow::bail!("storage unavailable")
        }
        async fn get_by_id(&self, _id: i64) -> anyhow::Result<Option<Game>> {
            anyhow::bail!("storage unavailable")
        }
        async fn list_by_state(&self, _state: GameState) -> anyhow::Result<Vec<Game>> {
            anyhow::bail!("storage unavailable")
        }
        async fn count_moves_in_column(&self, _game_id: i64, _column: i64) -> anyhow::Result<i64> {
            anyhow::bail!("storage unavailable")
        }
        async fn list_moves(&self, _game_id: i64) -> anyhow::Result<Vec<RecordedMove>> {
            anyhow::bail!("storage unavailable")
        }
        async fn finish(&self, _id: i64, _winner_id: Option<&str>) -> anyhow::Result<bool> {
            anyhow::bail!("storage unavailable")
        }
        async fn record_move(
            &self,
            _game_id: i64,
            _expected_player_index: i64,
            _mv: &Move,
        ) -> anyhow::Result<RecordOutcome> {
            anyhow::bail!("storage unavailable")
        }
    }

    #[tokio::test]
    async fn test_validate_storage_failure_is_an_error() {
        let validator = MoveValidator::new(Arc::new(UnavailableRepository));

        let result = validator.validate(1, &Move::new(0, "a")).await;

        match result {
            Err(GameServiceError::Storage(e)) => {
                assert!(format!("{:#}", e).contains("storage unavailable"));
                assert!(e.to_string().contains("game 1"));
            }
            other => panic!("expected storage error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validate_count_failure_is_an_error() {
        let validator = MoveValidator::new(Arc::new(UnavailableRepository));
        let game = game(&["alice", "bob"], 1, GameState::InProgress);

        let result = validator.validate_loaded(&game, &Move::new(0, "bob")).await;

        assert!(matches!(result, Err(GameServiceError::Storage(_))));
    }

    #[tokio::test]
    async fn test_validate_rejects_without_counting() {
        let validator = MoveValidator::new(Arc::new(UnavailableRepository));
        let in_progress = game(&["alice", "bob"], 1, GameState::InProgress);
        let finished = game(&["alice", "bob"], 1, GameState::Finished);

        let cases = [
            (&finished, Move::new(0, "bob"), "GAME_FINISHED"),
            (&in_progress, Move::new(7, "bob"), "COLUMN_OUT_OF_RANGE"),
            (&in_progress, Move::new(0, "alice"), "WRONG_TURN"),
        ];
        for (game, mv, code) in cases {
            let verdict = validator
                .validate_loaded(game, &mv)
                .await
                .expect("rejection must not read the move count");
            assert_eq!(verdict.violation().map(Violation::code), Some(code));
        }
    }

    #[tokio::test]
    async fn test_validate_corrupt_turn_index_is_an_error() {
        let validator = MoveValidator::new(Arc::new(UnavailableRepository));
        let game = game(&["alice"], 4, GameState::InProgress);

        let result = validator.validate_loaded(&game, &Move::new(0, "alice")).await;

        assert!(matches!(result, Err(GameServiceError::Storage(_))));
    }
}
