//! Route configuration and setup.

use crate::constants::{API_PREFIX, DOWNLOAD_PATH, MULTIPART_OVERHEAD_BYTES, PREVIEW_PATH};
use crate::handlers::{download, files, health, upload};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use dropvault_core::Config;
use dropvault_infra::{request_id_middleware, security_headers_middleware};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let body_limit = config
        .max_file_size_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    tracing::info!(
        body_limit_bytes = body_limit,
        http_concurrency_limit = config.http_concurrency_limit,
        "Request limits enabled"
    );

    let app = public_routes()
        .merge(owner_routes())
        .layer(ConcurrencyLimitLayer::new(config.http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .with_state(state);

    Ok(app)
}

/// Share links and health: no owner required.
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route(&format!("{}/{{id}}", PREVIEW_PATH), get(files::preview_file))
        .route(&format!("{}/{{id}}", DOWNLOAD_PATH), get(download::download_file))
}

/// Routes that read the owner header.
fn owner_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/upload", API_PREFIX), post(upload::upload_file))
        .route(&format!("{}/my-files", API_PREFIX), get(files::list_my_files))
}
