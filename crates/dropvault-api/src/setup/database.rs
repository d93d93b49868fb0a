//! Metadata store setup

use anyhow::{Context, Result};
use dropvault_core::Config;
use dropvault_db::{setup_database, MetadataStore, SqliteFileRepository};
use std::sync::Arc;

/// Connect to SQLite, run migrations and wrap the pool in a repository.
pub async fn setup_metadata_store(config: &Config) -> Result<Arc<dyn MetadataStore>> {
    let pool = setup_database(&config.database)
        .await
        .context("Failed to set up metadata database")?;
    Ok(Arc::new(SqliteFileRepository::new(pool)))
}
