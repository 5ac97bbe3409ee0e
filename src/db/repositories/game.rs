//! Game repository
//!
//! Database operations for games, their players and recorded moves.
//!
//! This module provides:
//! - `GameRepository` trait defining the interface for game data access
//! - `SqlxGameRepository` implementing the trait for SQLite and MySQL
//!
//! Both backends accept `?` placeholders, so the SQL text is shared and only
//! row decoding and insert-id retrieval differ.

use crate::db::DynDatabasePool;
use crate::models::{Game, GameState, Move, NewGame, RecordedMove};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::sync::Arc;

const INSERT_GAME: &str = r#"
    INSERT INTO games (number_of_players, current_player, state, winner_id, board_columns, board_rows, created_at, updated_at)
    VALUES (?, ?, ?, NULL, ?, ?, ?, ?)
"#;

const INSERT_PLAYER: &str =
    "INSERT INTO game_players (game_id, position, player_id) VALUES (?, ?, ?)";

const SELECT_GAME_BY_ID: &str = r#"
    SELECT id, number_of_players, current_player, state, winner_id, board_columns, board_rows, created_at, updated_at
    FROM games
    WHERE id = ?
"#;

const SELECT_GAMES_BY_STATE: &str = r#"
    SELECT id, number_of_players, current_player, state, winner_id, board_columns, board_rows, created_at, updated_at
    FROM games
    WHERE state = ?
    ORDER BY id
"#;

const SELECT_PLAYER_IDS: &str =
    "SELECT player_id FROM game_players WHERE game_id = ? ORDER BY position";

const COUNT_MOVES_IN_COLUMN: &str =
    "SELECT COUNT(*) AS move_count FROM moves WHERE game_id = ? AND column_index = ?";

const SELECT_MOVES: &str = r#"
    SELECT id, game_id, column_index, player_id, created_at
    FROM moves
    WHERE game_id = ?
    ORDER BY id
"#;

const FINISH_GAME: &str = r#"
    UPDATE games
    SET state = ?, winner_id = ?, updated_at = ?
    WHERE id = ? AND state = ?
"#;

// Compare-and-set on the turn index: only succeeds if nobody else advanced
// the game since the caller validated against `current_player`.
const ADVANCE_TURN: &str = r#"
    UPDATE games
    SET current_player = (current_player + 1) % number_of_players, updated_at = ?
    WHERE id = ? AND current_player = ? AND state = ?
"#;

const SELECT_BOARD_ROWS: &str = "SELECT board_rows FROM games WHERE id = ?";

const INSERT_MOVE: &str =
    "INSERT INTO moves (game_id, column_index, player_id, created_at) VALUES (?, ?, ?, ?)";

/// Outcome of [`GameRepository::record_move`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// The move was stored and the turn advanced
    Recorded(RecordedMove),
    /// The game finished or the turn moved on since the caller looked
    Conflict,
    /// The column filled up since the caller looked
    ColumnFull,
}

/// Game repository trait
#[async_trait]
pub trait GameRepository: Send + Sync {
    /// Create a game and its player memberships as one unit of work
    async fn create(&self, new_game: &NewGame) -> Result<Game>;

    /// Get a game with its players in turn order
    async fn get_by_id(&self, id: i64) -> Result<Option<Game>>;

    /// List games in the given state, ordered by id, without players
    async fn list_by_state(&self, state: GameState) -> Result<Vec<Game>>;

    /// List games still in progress, without players
    async fn list_active(&self) -> Result<Vec<Game>> {
        self.list_by_state(GameState::InProgress).await
    }

    /// Count recorded moves in one column of a game
    async fn count_moves_in_column(&self, game_id: i64, column: i64) -> Result<i64>;

    /// List recorded moves of a game in the order they were made
    async fn list_moves(&self, game_id: i64) -> Result<Vec<RecordedMove>>;

    /// Move an in-progress game to `FINISHED`.
    ///
    /// Returns `false` if there is no in-progress game with this id.
    async fn finish(&self, id: i64, winner_id: Option<&str>) -> Result<bool>;

    /// Store a move and advance the turn in one transaction.
    ///
    /// `expected_player_index` is the turn index the caller validated
    /// against; if the stored index differs the move is not recorded.
    async fn record_move(
        &self,
        game_id: i64,
        expected_player_index: i64,
        mv: &Move,
    ) -> Result<RecordOutcome>;
}

/// SQLx-based game repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxGameRepository {
    pool: DynDatabasePool,
}

impl SqlxGameRepository {
    /// Create a new SQLx game repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn GameRepository> {
        Arc::new(Self::new(pool))
    }

    fn backend(&self) -> Result<Backend<'_>> {
        if let Some(pool) = self.pool.as_sqlite() {
            return Ok(Backend::Sqlite(pool));
        }
        if let Some(pool) = self.pool.as_mysql() {
            return Ok(Backend::Mysql(pool));
        }
        anyhow::bail!("Database pool exposes no supported backend")
    }
}

enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

#[async_trait]
impl GameRepository for SqlxGameRepository {
    async fn create(&self, new_game: &NewGame) -> Result<Game> {
        let game = match self.backend()? {
            Backend::Sqlite(pool) => create_game_sqlite(pool, new_game).await?,
            Backend::Mysql(pool) => create_game_mysql(pool, new_game).await?,
        };
        tracing::info!(
            game_id = game.id,
            players = game.player_count,
            "Game created"
        );
        Ok(game)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Game>> {
        match self.backend()? {
            Backend::Sqlite(pool) => get_game_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_game_by_id_mysql(pool, id).await,
        }
    }

    async fn list_by_state(&self, state: GameState) -> Result<Vec<Game>> {
        let games = match self.backend()? {
            Backend::Sqlite(pool) => list_games_by_state_sqlite(pool, state).await?,
            Backend::Mysql(pool) => list_games_by_state_mysql(pool, state).await?,
        };
        tracing::debug!(%state, count = games.len(), "Games listed");
        Ok(games)
    }

    async fn count_moves_in_column(&self, game_id: i64, column: i64) -> Result<i64> {
        let context = || format!("Failed to count moves in column {} of game {}", column, game_id);
        let count: Result<i64, sqlx::Error> = match self.backend()? {
            Backend::Sqlite(pool) => sqlx::query(COUNT_MOVES_IN_COLUMN)
                .bind(game_id)
                .bind(column)
                .fetch_one(pool)
                .await
                .with_context(context)?
                .try_get("move_count"),
            Backend::Mysql(pool) => sqlx::query(COUNT_MOVES_IN_COLUMN)
                .bind(game_id)
                .bind(column)
                .fetch_one(pool)
                .await
                .with_context(context)?
                .try_get("move_count"),
        };
        count.with_context(context)
    }

    async fn list_moves(&self, game_id: i64) -> Result<Vec<RecordedMove>> {
        let context = || format!("Failed to list moves of game {}", game_id);
        match self.backend()? {
            Backend::Sqlite(pool) => sqlx::query(SELECT_MOVES)
                .bind(game_id)
                .fetch_all(pool)
                .await
                .with_context(context)?
                .iter()
                .map(row_to_move_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(SELECT_MOVES)
                .bind(game_id)
                .fetch_all(pool)
                .await
                .with_context(context)?
                .iter()
                .map(row_to_move_mysql)
                .collect(),
        }
    }

    async fn finish(&self, id: i64, winner_id: Option<&str>) -> Result<bool> {
        let now = Utc::now();
        let context = || format!("Failed to finish game {}", id);
        let affected = match self.backend()? {
            Backend::Sqlite(pool) => sqlx::query(FINISH_GAME)
                .bind(GameState::Finished.as_str())
                .bind(winner_id)
                .bind(now)
                .bind(id)
                .bind(GameState::InProgress.as_str())
                .execute(pool)
                .await
                .with_context(context)?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(FINISH_GAME)
                .bind(GameState::Finished.as_str())
                .bind(winner_id)
                .bind(now)
                .bind(id)
                .bind(GameState::InProgress.as_str())
                .execute(pool)
                .await
                .with_context(context)?
                .rows_affected(),
        };

        if affected == 1 {
            tracing::info!(game_id = id, winner = ?winner_id, "Game finished");
        }
        Ok(affected == 1)
    }

    async fn record_move(
        &self,
        game_id: i64,
        expected_player_index: i64,
        mv: &Move,
    ) -> Result<RecordOutcome> {
        let outcome = match self.backend()? {
            Backend::Sqlite(pool) => {
                record_move_sqlite(pool, game_id, expected_player_index, mv).await?
            }
            Backend::Mysql(pool) => {
                record_move_mysql(pool, game_id, expected_player_index, mv).await?
            }
        };

        match &outcome {
            RecordOutcome::Recorded(recorded) => tracing::info!(
                game_id,
                move_id = recorded.id,
                column = mv.column,
                player = %mv.player,
                "Move recorded"
            ),
            other => tracing::debug!(game_id, column = mv.column, outcome = ?other, "Move not recorded"),
        }
        Ok(outcome)
    }
}

fn created_game(id: i64, new_game: &NewGame, now: DateTime<Utc>) -> Game {
    Game {
        id,
        player_count: new_game.players.len() as i64,
        current_player_index: new_game.current_player_index,
        state: GameState::InProgress,
        winner_id: None,
        columns: new_game.columns,
        rows: new_game.rows,
        players: new_game.players.clone(),
        created_at: now,
        updated_at: now,
    }
}

fn parse_state(id: i64, state: &str) -> Result<GameState> {
    GameState::from_str(state)
        .with_context(|| format!("Unknown state '{}' stored for game {}", state, id))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_game_sqlite(pool: &SqlitePool, new_game: &NewGame) -> Result<Game> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin game creation")?;

    match insert_game_rows_sqlite(&mut tx, new_game, now).await {
        Ok(id) => {
            tx.commit()
                .await
                .with_context(|| format!("Failed to commit game {}", id))?;
            Ok(created_game(id, new_game, now))
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "Failed to roll back game creation");
            }
            Err(e)
        }
    }
}

async fn insert_game_rows_sqlite(
    conn: &mut SqliteConnection,
    new_game: &NewGame,
    now: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query(INSERT_GAME)
        .bind(new_game.players.len() as i64)
        .bind(new_game.current_player_index)
        .bind(GameState::InProgress.as_str())
        .bind(new_game.columns)
        .bind(new_game.rows)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert game")?
        .last_insert_rowid();

    for (position, player_id) in new_game.players.iter().enumerate() {
        sqlx::query(INSERT_PLAYER)
            .bind(id)
            .bind(position as i64)
            .bind(player_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to insert player '{}' into game {}", player_id, id))?;
    }

    Ok(id)
}

async fn get_game_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Game>> {
    let row = sqlx::query(SELECT_GAME_BY_ID)
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to query game {}", id))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut game = row_to_game_sqlite(&row)?;

    game.players = sqlx::query(SELECT_PLAYER_IDS)
        .bind(id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to query players of game {}", id))?
        .iter()
        .map(|row| row.try_get::<String, _>("player_id"))
        .collect::<Result<_, _>>()
        .with_context(|| format!("Failed to read player row of game {}", id))?;

    Ok(Some(game))
}

async fn list_games_by_state_sqlite(pool: &SqlitePool, state: GameState) -> Result<Vec<Game>> {
    sqlx::query(SELECT_GAMES_BY_STATE)
        .bind(state.as_str())
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to query {} games", state))?
        .iter()
        .map(row_to_game_sqlite)
        .collect()
}

async fn record_move_sqlite(
    pool: &SqlitePool,
    game_id: i64,
    expected_player_index: i64,
    mv: &Move,
) -> Result<RecordOutcome> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin move")?;

    let advanced = sqlx::query(ADVANCE_TURN)
        .bind(now)
        .bind(game_id)
        .bind(expected_player_index)
        .bind(GameState::InProgress.as_str())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to advance turn of game {}", game_id))?
        .rows_affected();
    if advanced != 1 {
        tx.rollback().await.context("Failed to roll back move")?;
        return Ok(RecordOutcome::Conflict);
    }

    let rows: i64 = sqlx::query(SELECT_BOARD_ROWS)
        .bind(game_id)
        .fetch_one(&mut *tx)
        .await
        .and_then(|row| row.try_get("board_rows"))
        .with_context(|| format!("Failed to read board size of game {}", game_id))?;
    let filled: i64 = sqlx::query(COUNT_MOVES_IN_COLUMN)
        .bind(game_id)
        .bind(mv.column)
        .fetch_one(&mut *tx)
        .await
        .and_then(|row| row.try_get("move_count"))
        .with_context(|| format!("Failed to count moves in column {} of game {}", mv.column, game_id))?;
    if filled >= rows {
        tx.rollback().await.context("Failed to roll back move")?;
        return Ok(RecordOutcome::ColumnFull);
    }

    let id = sqlx::query(INSERT_MOVE)
        .bind(game_id)
        .bind(mv.column)
        .bind(&mv.player)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert move into game {}", game_id))?
        .last_insert_rowid();

    tx.commit()
        .await
        .with_context(|| format!("Failed to commit move into game {}", game_id))?;

    Ok(RecordOutcome::Recorded(RecordedMove {
        id,
        game_id,
        column: mv.column,
        player_id: mv.player.clone(),
        created_at: now,
    }))
}

fn row_to_game_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Game> {
    let id: i64 = row.try_get("id")?;
    let state: String = row.try_get("state")?;
    Ok(Game {
        id,
        player_count: row.try_get("number_of_players")?,
        current_player_index: row.try_get("current_player")?,
        state: parse_state(id, &state)?,
        winner_id: row.try_get("winner_id")?,
        columns: row.try_get("board_columns")?,
        rows: row.try_get("board_rows")?,
        players: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_move_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<RecordedMove> {
    Ok(RecordedMove {
        id: row.try_get("id")?,
        game_id: row.try_get("game_id")?,
        column: row.try_get("column_index")?,
        player_id: row.try_get("player_id")?,
        created_at: row.try_get("created_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_game_mysql(pool: &MySqlPool, new_game: &NewGame) -> Result<Game> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin game creation")?;

    match insert_game_rows_mysql(&mut tx, new_game, now).await {
        Ok(id) => {
            tx.commit()
                .await
                .with_context(|| format!("Failed to commit game {}", id))?;
            Ok(created_game(id, new_game, now))
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "Failed to roll back game creation");
            }
            Err(e)
        }
    }
}

async fn insert_game_rows_mysql(
    conn: &mut MySqlConnection,
    new_game: &NewGame,
    now: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query(INSERT_GAME)
        .bind(new_game.players.len() as i64)
        .bind(new_game.current_player_index)
        .bind(GameState::InProgress.as_str())
        .bind(new_game.columns)
        .bind(new_game.rows)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .context("Failed to insert game")?
        .last_insert_id() as i64;

    for (position, player_id) in new_game.players.iter().enumerate() {
        sqlx::query(INSERT_PLAYER)
            .bind(id)
            .bind(position as i64)
            .bind(player_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to insert player '{}' into game {}", player_id, id))?;
    }

    Ok(id)
}

async fn get_game_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Game>> {
    let row = sqlx::query(SELECT_GAME_BY_ID)
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to query game {}", id))?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut game = row_to_game_mysql(&row)?;

    game.players = sqlx::query(SELECT_PLAYER_IDS)
        .bind(id)
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to query players of game {}", id))?
        .iter()
        .map(|row| row.try_get::<String, _>("player_id"))
        .collect::<Result<_, _>>()
        .with_context(|| format!("Failed to read player row of game {}", id))?;

    Ok(Some(game))
}

async fn list_games_by_state_mysql(pool: &MySqlPool, state: GameState) -> Result<Vec<Game>> {
    sqlx::query(SELECT_GAMES_BY_STATE)
        .bind(state.as_str())
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to query {} games", state))?
        .iter()
        .map(row_to_game_mysql)
        .collect()
}

async fn record_move_mysql(
    pool: &MySqlPool,
    game_id: i64,
    expected_player_index: i64,
    mv: &Move,
) -> Result<RecordOutcome> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin move")?;

    // The UPDATE takes the row lock, serialising concurrent moves on this game.
    let advanced = sqlx::query(ADVANCE_TURN)
        .bind(now)
        .bind(game_id)
        .bind(expected_player_index)
        .bind(GameState::InProgress.as_str())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to advance turn of game {}", game_id))?
        .rows_affected();
    if advanced != 1 {
        tx.rollback().await.context("Failed to roll back move")?;
        return Ok(RecordOutcome::Conflict);
    }

    let rows: i64 = sqlx::query(SELECT_BOARD_ROWS)
        .bind(game_id)
        .fetch_one(&mut *tx)
        .await
        .and_then(|row| row.try_get("board_rows"))
        .with_context(|| format!("Failed to read board size of game {}", game_id))?;
    let filled: i64 = sqlx::query(COUNT_MOVES_IN_COLUMN)
        .bind(game_id)
        .bind(mv.column)
        .fetch_one(&mut *tx)
        .await
        .and_then(|row| row.try_get("move_count"))
        .with_context(|| format!("Failed to count moves in column {} of game {}", mv.column, game_id))?;
    if filled >= rows {
        tx.rollback().await.context("Failed to roll back move")?;
        return Ok(RecordOutcome::ColumnFull);
    }

    let id = sqlx::query(INSERT_MOVE)
        .bind(game_id)
        .bind(mv.column)
        .bind(&mv.player)
        .bind(now)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to insert move into game {}", game_id))?
        .last_insert_id() as i64;

    tx.commit()
        .await
        .with_context(|| format!("Failed to commit move into game {}", game_id))?;

    Ok(RecordOutcome::Recorded(RecordedMove {
        id,
        game_id,
        column: mv.column,
        player_id: mv.player.clone(),
        created_at: now,
    }))
}

fn row_to_game_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Game> {
    let id: i64 = row.try_get("id")?;
    let state: String = row.try_get("state")?;
    Ok(Game {
        id,
        player_count: row.try_get("number_of_players")?,
        current_player_index: row.try_get("current_player")?,
        state: parse_state(id, &state)?,
        winner_id: row.try_get("winner_id")?,
        columns: row.try_get("board_columns")?,
        rows: row.try_get("board_rows")?,
        players: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_move_mysql(row: &sqlx::mysql::MySqlRow) -> Result<RecordedMove> {
    Ok(RecordedMove {
        id: row.try_get("id")?,
        game_id: row.try_get("game_id")?,
        column: row.try_get("column_index")?,
        player_id: row.try_get("player_id")?,
        created_at: row.try_get("created_at")?,
    })
}
