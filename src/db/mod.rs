//! Database layer
//!
//! Storage for games, their players and recorded moves. SQLite is the
//! default backend; MySQL is selected through configuration.
//!
//! # Usage
//!
//! ```ignore
//! use connect_column::config::DatabaseConfig;
//! use connect_column::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
