//! Database setup and initialization

use anyhow::{Context, Result};
use dropvault_core::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Connect to the metadata database and run migrations.
pub async fn setup_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    tracing::info!(url = %config.url, "Connecting to database...");

    // Every connection to `:memory:` is its own database.
    let in_memory = config.url.contains(":memory:");
    let max_connections = if in_memory { 1 } else { config.max_connections };

    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("Invalid DATABASE_URL: {}", config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(config.timeout)
        .idle_timeout(Duration::from_secs(600))
        .connect_with(options)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(max_connections, "Database connected successfully");

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Open (creating if needed) the SQLite file at `path` and migrate it.
pub async fn connect_and_migrate(path: &std::path::Path) -> Result<SqlitePool> {
    let config = DatabaseConfig {
        url: format!("sqlite://{}", path.display()),
        max_connections: 5,
        timeout: Duration::from_secs(30),
    };
    setup_database(&config).await
}

/// Apply embedded migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");
    Ok(())
}
