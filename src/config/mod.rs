//! Configuration management
//!
//! This module handles loading and parsing configuration for Connect Column.
//! Configuration can be loaded from:
//! - connect_column.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// New game configuration
    #[serde(default)]
    pub game: GameConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "connectcolumn.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Settings applied to every newly created game.
///
/// The board dimensions are copied into the game row at creation time, so
/// changing them only affects games created afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Number of board columns
    #[serde(default = "default_columns")]
    pub columns: i64,
    /// Number of board rows (tokens a column can hold)
    #[serde(default = "default_rows")]
    pub rows: i64,
    /// Zero-based index of the player who moves first.
    ///
    /// Defaults to 1, i.e. the *second* listed player opens. The value is
    /// reduced modulo the player count when a game is created.
    #[serde(default = "default_opening_player")]
    pub opening_player: i64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            rows: default_rows(),
            opening_player: default_opening_player(),
        }
    }
}

fn default_columns() -> i64 {
    7
}

fn default_rows() -> i64 {
    6
}

fn default_opening_player() -> i64 {
    1
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - CONNECT_COLUMN_DATABASE_DRIVER
    /// - CONNECT_COLUMN_DATABASE_URL
    /// - CONNECT_COLUMN_GAME_COLUMNS
    /// - CONNECT_COLUMN_GAME_ROWS
    /// - CONNECT_COLUMN_GAME_OPENING_PLAYER
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot reject on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.columns < 1 {
            return Err(ConfigError::ValidationError(format!(
                "game.columns must be at least 1, got {}",
                self.game.columns
            )));
        }
        if self.game.rows < 1 {
            return Err(ConfigError::ValidationError(format!(
                "game.rows must be at least 1, got {}",
                self.game.rows
            )));
        }
        if self.game.opening_player < 0 {
            return Err(ConfigError::ValidationError(format!(
                "game.opening_player must not be negative, got {}",
                self.game.opening_player
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(driver) = std::env::var("CONNECT_COLUMN_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("CONNECT_COLUMN_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(columns) = env_i64("CONNECT_COLUMN_GAME_COLUMNS") {
            self.game.columns = columns;
        }
        if let Some(rows) = env_i64("CONNECT_COLUMN_GAME_ROWS") {
            self.game.rows = rows;
        }
        if let Some(opening) = env_i64("CONNECT_COLUMN_GAME_OPENING_PLAYER") {
            self.game.opening_player = opening;
        }
    }
}

/// Read an integer environment variable, ignoring unparsable values
fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok()?.trim().parse().ok()
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENV_KEYS: &[&str] = &[
        "CONNECT_COLUMN_DATABASE_DRIVER",
        "CONNECT_COLUMN_DATABASE_URL",
        "CONNECT_COLUMN_GAME_COLUMNS",
        "CONNECT_COLUMN_GAME_ROWS",
        "CONNECT_COLUMN_GAME_OPENING_PLAYER",
    ];

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_connect_column.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.database.url, "connectcolumn.db");
        assert_eq!(config.game, GameConfig::default());
        assert_eq!(config.game.columns, 7);
        assert_eq!(config.game.rows, 6);
        assert_eq!(config.game.opening_player, 1);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "   \n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.database.url, "connectcolumn.db");
        assert_eq!(config.game.columns, 7);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "game:\n  rows: 8\n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.game.rows, 8);
        assert_eq!(config.game.columns, 7);
        assert_eq!(config.game.opening_player, 1);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
database:
  driver: mysql
  url: "mysql://root@localhost/connect_column"
game:
  columns: 9
  rows: 7
  opening_player: 0
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.url, "mysql://root@localhost/connect_column");
        assert_eq!(config.game.columns, 9);
        assert_eq!(config.game.rows, 7);
        assert_eq!(config.game.opening_player, 0);
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "game:\n  rows: [not a number").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_zero_rows_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "game:\n  rows: 0\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("game.rows"));
    }

    #[test]
    fn test_env_override_database_and_game() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "database:\n  url: file.db\n").unwrap();

        std::env::set_var("CONNECT_COLUMN_DATABASE_DRIVER", "MySQL");
        std::env::set_var("CONNECT_COLUMN_DATABASE_URL", "mysql://db/games");
        std::env::set_var("CONNECT_COLUMN_GAME_COLUMNS", "8");
        std::env::set_var("CONNECT_COLUMN_GAME_ROWS", "5");
        std::env::set_var("CONNECT_COLUMN_GAME_OPENING_PLAYER", "0");

        let config = Config::load_with_env(file.path()).unwrap();
        clear_env();

        assert_eq!(config.database.driver, DatabaseDriver::Mysql);
        assert_eq!(config.database.url, "mysql://db/games");
        assert_eq!(config.game.columns, 8);
        assert_eq!(config.game.rows, 5);
        assert_eq!(config.game.opening_player, 0);
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = lock_env();
        clear_env();

        std::env::set_var("CONNECT_COLUMN_DATABASE_DRIVER", "postgres");
        std::env::set_var("CONNECT_COLUMN_GAME_ROWS", "many");

        let config =
            Config::load_with_env(std::path::Path::new("nonexistent_connect_column.yml")).unwrap();
        clear_env();

        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.game.rows, 6);
    }

    #[test]
    fn test_env_override_is_validated() {
        let _guard = lock_env();
        clear_env();

        std::env::set_var("CONNECT_COLUMN_GAME_COLUMNS", "0");

        let result =
            Config::load_with_env(std::path::Path::new("nonexistent_connect_column.yml"));
        clear_env();

        assert!(result.is_err());
    }
}
