use crate::keys::validate_storage_key;
use crate::traits::{BlobEntry, BlobReader, BlobStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncReadExt;

/// Chunk size used when streaming a blob back out.
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct MemoryBlob {
    data: Bytes,
    modified_at: DateTime<Utc>,
}

/// In-memory blob store.
///
/// Open streams hold their own reference to the bytes, so deleting a key never
/// affects a reader that already has it. Failure switches let tests exercise
/// error paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: DashMap<String, MemoryBlob>,
    fail_saves: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with a backend error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` fail with a backend error.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Store a blob directly, bypassing `save` (e.g. to plant an orphan with a chosen age).
    pub fn insert(&self, storage_key: &str, data: impl Into<Bytes>, modified_at: DateTime<Utc>) {
        self.blobs.insert(
            storage_key.to_string(),
            MemoryBlob {
                data: data.into(),
                modified_at,
            },
        );
    }

    /// Stored bytes for a key.
    pub fn get(&self, storage_key: &str) -> Option<Bytes> {
        self.blobs.get(storage_key).map(|b| b.data.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, storage_key: &str, mut reader: BlobReader) -> StorageResult<u64> {
        validate_storage_key(storage_key)?;
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError(
                "memory storage configured to fail saves".to_string(),
            ));
        }

        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to read upload: {}", e)))?;
        let written = buf.len() as u64;

        match self.blobs.entry(storage_key.to_string()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(storage_key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(MemoryBlob {
                    data: Bytes::from(buf),
                    modified_at: Utc::now(),
                });
                tracing::debug!(key = %storage_key, size_bytes = written, "Memory storage save");
                Ok(written)
            }
        }
    }

    async fn open(&self, storage_key: &str) -> StorageResult<BlobStream> {
        validate_storage_key(storage_key)?;
        let data = self
            .get(storage_key)
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))?;

        let chunks: Vec<StorageResult<Bytes>> = (0..data.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
            .collect();

        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_storage_key(storage_key)?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(
                "memory storage configured to fail deletes".to_string(),
            ));
        }
        self.blobs
            .remove(storage_key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_storage_key(storage_key)?;
        Ok(self.blobs.contains_key(storage_key))
    }

    async fn list(&self) -> StorageResult<Vec<BlobEntry>> {
        let mut entries: Vec<BlobEntry> = self
            .blobs
            .iter()
            .map(|item| BlobEntry {
                key: item.key().clone(),
                size: item.value().data.len() as u64,
                modified_at: item.value().modified_at,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
