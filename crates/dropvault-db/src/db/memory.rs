//! In-process metadata store backed by `DashMap`.
//!
//! The download gate runs under the per-key shard lock, which gives the same
//! single-winner guarantee as the SQL conditional update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dropvault_core::models::FileRecord;
use dropvault_core::AppError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::store::{DownloadGate, MetadataStore};

#[derive(Debug, Clone)]
struct StoredFile {
    record: FileRecord,
    // Insertion order, newest-first tiebreak for equal created_at.
    seq: u64,
}

#[derive(Debug, Default)]
pub struct MemoryFileRepository {
    files: DashMap<String, StoredFile>,
    next_seq: AtomicU64,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `put` fail with a database-style error.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn sorted<F>(&self, filter: F) -> Vec<StoredFile>
    where
        F: Fn(&FileRecord) -> bool,
    {
        let mut out: Vec<StoredFile> = self
            .files
            .iter()
            .filter(|item| filter(&item.value().record))
            .map(|item| item.value().clone())
            .collect();
        out.sort_by_key(|f| f.seq);
        out
    }
}

#[async_trait]
impl MetadataStore for MemoryFileRepository {
    async fn put(&self, record: &FileRecord) -> Result<(), AppError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(AppError::Internal(
                "memory metadata store configured to fail puts".to_string(),
            ));
        }
        match self.files.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "File {} already exists",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(StoredFile {
                    record: record.clone(),
                    seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                });
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<FileRecord>, AppError> {
        Ok(self.files.get(id).map(|f| f.record.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Internal(
                "memory metadata store configured to fail deletes".to_string(),
            ));
        }
        Ok(self.files.remove(id).is_some())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError> {
        let mut files = self.sorted(|r| r.owner_id == owner_id);
        files.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(files.into_iter().map(|f| f.record).collect())
    }

    async fn increment_download_count(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<DownloadGate, AppError> {
        let Some(mut entry) = self.files.get_mut(id) else {
            return Ok(DownloadGate::Missing);
        };
        let record = &mut entry.record;
        if record.is_expired_at(now) {
            return Ok(DownloadGate::Expired);
        }
        if record.is_condemned() {
            return Ok(DownloadGate::Condemned);
        }
        let previous_count = record.download_count;
        record.download_count += 1;
        Ok(DownloadGate::Granted { previous_count })
    }

    async fn list_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<FileRecord>, AppError> {
        let mut files = self.sorted(|r| r.is_expired_at(now));
        files.sort_by_key(|f| f.record.expires_at);
        Ok(files.into_iter().take(limit).map(|f| f.record).collect())
    }

    async fn list_condemned(&self, limit: usize) -> Result<Vec<FileRecord>, AppError> {
        Ok(self
            .sorted(FileRecord::is_condemned)
            .into_iter()
            .take(limit)
            .map(|f| f.record)
            .collect())
    }

    async fn storage_key_exists(&self, storage_key: &str) -> Result<bool, AppError> {
        Ok(self
            .files
            .iter()
            .any(|item| item.value().record.storage_key == storage_key))
    }
}
