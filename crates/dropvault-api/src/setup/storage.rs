//! Blob store setup

use anyhow::{Context, Result};
use dropvault_core::Config;
use dropvault_storage::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    create_storage(&config.storage)
        .await
        .with_context(|| format!("Failed to create {} blob storage", config.storage.backend))
}
