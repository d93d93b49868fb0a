use crate::error::HttpAppError;
use crate::handlers::files::not_found;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, Response, StatusCode},
};
use dropvault_core::{is_valid_file_id, sanitize_display_name, AppError};
use futures::StreamExt;
use std::sync::Arc;

fn content_type_header(content_type: &str) -> HeaderValue {
    HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

fn content_disposition_header(display_name: &str) -> HeaderValue {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        sanitize_display_name(display_name)
    );
    HeaderValue::from_str(&disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Stream a file to the caller. The download is counted before the first
/// byte goes out; a one-time file is burned even if the transfer is aborted.
#[tracing::instrument(skip(state), fields(file.id = %id, operation = "download_file"))]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response<Body>, HttpAppError> {
    if !is_valid_file_id(&id) {
        return Err(not_found(&id));
    }

    let (stream, record) = state.files.download(&id).await?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_header(&record.content_type))
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&record.display_name),
        )
        .header(header::CACHE_CONTROL, "no-store");
    if record.size_bytes > 0 {
        builder = builder.header(header::CONTENT_LENGTH, record.size_bytes);
    }

    let response = builder
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}
