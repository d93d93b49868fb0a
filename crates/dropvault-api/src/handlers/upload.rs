use crate::auth::OwnerContext;
use crate::constants::FILE_FIELD;
use crate::error::HttpAppError;
use crate::handlers::files::FileResponse;
use crate::state::AppState;
use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use dropvault_core::{validate_upload_size, AppError, UploadRequest};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Display name used when the client sends no file name.
const DEFAULT_DISPLAY_NAME: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// The `file` field, written to an anonymous temp file as it arrives.
struct SpooledFile {
    file: File,
    size: u64,
    display_name: String,
    content_type: String,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("Upload too large: {}", e.body_text()))
    } else {
        AppError::InvalidInput(format!("Failed to read multipart: {}", e.body_text()))
    }
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(multipart_error)
}

fn parse_bool(name: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        other => Err(AppError::InvalidInput(format!(
            "Invalid value for {}: {}",
            name, other
        ))),
    }
}

/// Copy the field to disk chunk by chunk, failing as soon as `max_bytes` is exceeded.
async fn spool_field(mut field: Field<'_>, max_bytes: u64) -> Result<SpooledFile, AppError> {
    let display_name = field
        .file_name()
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());
    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    let std_file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create spool file: {}", e)))??;
    let mut file = File::from_std(std_file);

    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size > max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File size exceeds limit of {} bytes",
                max_bytes
            )));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.rewind().await?;

    Ok(SpooledFile {
        file,
        size,
        display_name,
        content_type,
    })
}

/// Accept a multipart upload: a `file` field plus optional `onetime` and
/// `ttl_seconds` text fields in any order.
#[tracing::instrument(skip(state, multipart), fields(owner_id = %owner.owner_id))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), HttpAppError> {
    let max_bytes = state.config.max_file_size_bytes as u64;

    let mut spooled: Option<SpooledFile> = None;
    let mut one_time = false;
    let mut ttl_seconds: Option<u64> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                if spooled.is_some() {
                    return Err(AppError::InvalidInput(
                        "Send exactly one field named 'file'".to_string(),
                    )
                    .into());
                }
                spooled = Some(spool_field(field, max_bytes).await?);
            }
            "onetime" | "one_time" => {
                one_time = parse_bool(&name, &read_text(field).await?)?;
            }
            "ttl_seconds" => {
                let value = read_text(field).await?;
                let value = value.trim();
                if !value.is_empty() {
                    ttl_seconds = Some(value.parse().map_err(|_| {
                        AppError::InvalidInput(format!("Invalid ttl_seconds: {}", value))
                    })?);
                }
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let spooled = spooled
        .ok_or_else(|| AppError::InvalidInput("Missing multipart field 'file'".to_string()))?;
    validate_upload_size(spooled.size, max_bytes)?;

    let new_file = UploadRequest {
        display_name: spooled.display_name,
        content_type: spooled.content_type,
        owner_id: owner.owner_id,
        one_time,
        ttl_seconds,
    }
    .into_new_file()?;

    let record = state
        .files
        .upload(Box::pin(spooled.file), new_file)
        .await?;

    Ok((StatusCode::CREATED, Json(FileResponse::from(record))))
}
