//! Connect Column - create a game and list the active ones

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use connect_column::{
    config::Config,
    db::{self, repositories::SqlxGameRepository},
    services::GameService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "connect_column=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::load_with_env(Path::new("connect_column.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    pool.ping().await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let service = GameService::new(SqlxGameRepository::boxed(pool.clone()), config.game.clone());

    let mut players: Vec<String> = std::env::args().skip(1).collect();
    if players.is_empty() {
        players = vec!["player1".to_string(), "player2".to_string()];
    }

    let game = service.create_game(players).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&game).context("Failed to serialize game")?
    );

    let active = service.list_active_games().await?;
    println!("Active games: {}", active.len());
    for game in &active {
        println!(
            "  #{} {} players, {}x{}, player index {} to move",
            game.id, game.player_count, game.columns, game.rows, game.current_player_index
        );
    }

    pool.close().await;
    Ok(())
}
