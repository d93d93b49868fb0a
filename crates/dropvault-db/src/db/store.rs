//! Metadata store contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropvault_core::models::FileRecord;
use dropvault_core::AppError;

/// Outcome of the atomic download gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadGate {
    /// The count was incremented. `previous_count` is the value before this download.
    Granted { previous_count: i64 },
    /// The record exists but `now >= expires_at`. Nothing changed.
    Expired,
    /// A one-time record that was already handed out. Nothing changed.
    Condemned,
    /// No record with that id.
    Missing,
}

/// Durable record store for file metadata.
///
/// `get` returning `Ok(None)` means "no such record"; `Err` is reserved for
/// real failures.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. A duplicate id fails with [`AppError::Conflict`].
    async fn put(&self, record: &FileRecord) -> Result<(), AppError>;

    async fn get(&self, id: &str) -> Result<Option<FileRecord>, AppError>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    /// Records owned by `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError>;

    /// Single-winner gate for downloads.
    ///
    /// In one atomic step: increment `download_count` only if the record exists,
    /// has not expired at `now`, and is not a one-time record that was already
    /// downloaded. Concurrent callers for the same one-time record see exactly
    /// one `Granted`.
    async fn increment_download_count(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<DownloadGate, AppError>;

    /// Records with `expires_at <= now`, oldest expiry first.
    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<FileRecord>, AppError>;

    /// One-time records that have already been downloaded.
    async fn list_condemned(&self, limit: usize) -> Result<Vec<FileRecord>, AppError>;

    /// Whether any record points at `storage_key`.
    async fn storage_key_exists(&self, storage_key: &str) -> Result<bool, AppError>;
}
