//! Storage abstraction trait
//!
//! This module defines the Storage trait that all blob store backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dropvault_core::AppError;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Blob not found: {}", key)),
            StorageError::AlreadyExists(key) => {
                AppError::Conflict(format!("Blob already exists: {}", key))
            }
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::storage(other.to_string(), other),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte source handed to [`Storage::save`].
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Chunked blob contents returned by [`Storage::open`].
pub type BlobStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// One stored blob, as reported by [`Storage::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub key: String,
    pub size: u64,
    pub modified_at: DateTime<Utc>,
}

/// Storage abstraction trait
///
/// Contract shared by every backend:
/// - `save` never leaves a partial blob under `storage_key` and refuses a key
///   that is already taken.
/// - A stream returned by `open` keeps working after the key is deleted.
/// - `open` and `delete` report a missing key as [`StorageError::NotFound`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Consume `reader` to EOF and store it under `storage_key`.
    /// Returns the number of bytes written.
    async fn save(&self, storage_key: &str, reader: BlobReader) -> StorageResult<u64>;

    /// Open a blob for streaming.
    async fn open(&self, storage_key: &str) -> StorageResult<BlobStream>;

    /// Delete a blob.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a blob exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Every stored blob. Used by the orphan sweep.
    async fn list(&self) -> StorageResult<Vec<BlobEntry>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
