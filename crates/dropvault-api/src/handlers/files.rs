use crate::auth::OwnerContext;
use crate::constants::{DOWNLOAD_PATH, PREVIEW_PATH};
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use dropvault_core::{is_valid_file_id, AppError, FileRecord};
use serde::Serialize;
use std::sync::Arc;

/// Public view of a file record. The storage key stays internal.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub display_name: String,
    pub size_bytes: i64,
    pub content_type: String,
    pub one_time: bool,
    pub download_count: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub share_url: String,
    pub preview_url: String,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            share_url: format!("{}/{}", DOWNLOAD_PATH, record.id),
            preview_url: format!("{}/{}", PREVIEW_PATH, record.id),
            id: record.id,
            display_name: record.display_name,
            size_bytes: record.size_bytes,
            content_type: record.content_type,
            one_time: record.one_time,
            download_count: record.download_count,
            expires_at: record.expires_at,
            created_at: record.created_at,
        }
    }
}

pub(crate) fn not_found(id: &str) -> HttpAppError {
    AppError::NotFound(format!("File {} not found", id)).into()
}

/// Files of the calling owner that can still be downloaded, newest first.
#[tracing::instrument(skip(state), fields(owner_id = %owner.owner_id))]
pub async fn list_my_files(
    State(state): State<Arc<AppState>>,
    owner: OwnerContext,
) -> Result<Json<Vec<FileResponse>>, HttpAppError> {
    let now = state.files.now();
    let files = state
        .files
        .list_by_owner(&owner.owner_id)
        .await?
        .into_iter()
        .filter(|record| record.is_downloadable_at(now))
        .map(FileResponse::from)
        .collect();
    Ok(Json(files))
}

/// Metadata for a share link. Expired files answer 410 but are left for the
/// download path or the sweep to burn.
#[tracing::instrument(skip(state), fields(file.id = %id))]
pub async fn preview_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, HttpAppError> {
    if !is_valid_file_id(&id) {
        return Err(not_found(&id));
    }

    let record = state.files.get_metadata(&id).await?;

    if state.files.is_expired(&record) {
        return Err(AppError::Expired {
            id: record.id,
            expired_at: record.expires_at,
        }
        .into());
    }
    if record.is_condemned() {
        return Err(not_found(&id));
    }

    Ok(Json(FileResponse::from(record)))
}
