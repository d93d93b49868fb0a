//! Application setup and initialization
//!
//! Everything main.rs needs to go from a `Config` to a running router.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use dropvault_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate().context("Configuration validation failed")?;

    dropvault_infra::init_telemetry(config.log_format)
        .context("Failed to initialize telemetry")?;

    tracing::info!(
        environment = %config.environment,
        "Configuration loaded and validated successfully"
    );

    let metadata = database::setup_metadata_store(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let state = services::initialize_services(&config, metadata, storage);

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
