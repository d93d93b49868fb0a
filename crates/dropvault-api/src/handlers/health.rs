//! Health check handlers and response types.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use dropvault_worker::BurnQueueStats;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_KEY: &str = "health-check";

/// Run an async check with timeout; returns "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub metadata: String,
    pub storage: String,
    pub burn_queue: BurnQueueStats,
}

/// Probe the metadata and blob stores and report burn queue counters.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metadata = state.files.metadata().clone();
    let metadata_status = run_check(
        CHECK_TIMEOUT,
        async move { metadata.get(PROBE_KEY).await.map(drop) },
        "unhealthy",
    )
    .await;

    let storage = state.files.storage().clone();
    let storage_status = run_check(
        CHECK_TIMEOUT,
        async move { storage.exists(PROBE_KEY).await.map(drop) },
        "unhealthy",
    )
    .await;

    let healthy = metadata_status == "healthy" && storage_status == "healthy";
    if !healthy {
        tracing::warn!(
            metadata = %metadata_status,
            storage = %storage_status,
            "Health check failed"
        );
    }

    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        metadata: metadata_status,
        storage: storage_status,
        burn_queue: state.files.burn_queue_stats(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
