//! File lifecycle: upload, download, burn.
//!
//! Ordering rules the rest of the system relies on:
//! - the blob is written before its metadata row, so "metadata implies blob"
//!   holds except inside the crash window between the two writes;
//! - a failed metadata write deletes the blob it was meant to describe;
//! - downloads are granted through [`MetadataStore::increment_download_count`],
//!   never by reading `download_count` and comparing it locally;
//! - burns run on the [`BurnQueue`], off the request path.

use std::sync::{Arc, Weak};
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use dropvault_core::{
    AppError, BurnReason, Clock, FileRecord, IdGenerator, JobError, LifecyclePolicy, NewFile,
    RandomIdGenerator, SystemClock,
};
use dropvault_db::{DownloadGate, MetadataStore};
use dropvault_storage::{storage_key_for, BlobReader, BlobStream, Storage};
use dropvault_worker::{BurnHandler, BurnJob, BurnQueue, BurnQueueConfig, BurnQueueStats};

/// What a burn found and removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BurnReport {
    /// A metadata record existed when the burn started.
    pub existed: bool,
    /// The blob is gone from the blob store (deleted now, or already missing).
    pub blob_removed: bool,
}

impl BurnReport {
    fn already_burned() -> Self {
        Self {
            existed: false,
            blob_removed: false,
        }
    }
}

pub struct FileLifecycleManagerBuilder {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    policy: LifecyclePolicy,
    queue_config: BurnQueueConfig,
}

impl FileLifecycleManagerBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn policy(mut self, policy: LifecyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn burn_queue(mut self, config: BurnQueueConfig) -> Self {
        self.queue_config = config;
        self
    }

    /// Build the manager and start its burn queue.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Arc<FileLifecycleManager> {
        let Self {
            metadata,
            storage,
            clock,
            ids,
            policy,
            queue_config,
        } = self;

        Arc::new_cyclic(|weak: &Weak<FileLifecycleManager>| {
            let handler: Weak<dyn BurnHandler> = weak.clone();
            FileLifecycleManager {
                metadata,
                storage,
                clock,
                ids,
                policy,
                burn_queue: BurnQueue::start(queue_config, handler),
            }
        })
    }
}

/// Orchestrates the blob store and the metadata store for every file.
///
/// Holds no per-file state of its own; the metadata store is the
/// synchronization point for concurrent downloads.
pub struct FileLifecycleManager {
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    policy: LifecyclePolicy,
    burn_queue: BurnQueue,
}

impl FileLifecycleManager {
    pub fn builder(
        metadata: Arc<dyn MetadataStore>,
        storage: Arc<dyn Storage>,
    ) -> FileLifecycleManagerBuilder {
        FileLifecycleManagerBuilder {
            metadata,
            storage,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIdGenerator),
            policy: LifecyclePolicy::default(),
            queue_config: BurnQueueConfig::default(),
        }
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Store the bytes, then the record.
    ///
    /// If the record cannot be written, the blob is deleted again before the
    /// error is returned. A failing compensation is logged and the original
    /// error still wins.
    #[tracing::instrument(
        skip(self, reader, new_file),
        fields(owner_id = %new_file.owner_id, one_time = new_file.one_time, file.id = tracing::field::Empty)
    )]
    pub async fn upload(&self, reader: BlobReader, new_file: NewFile) -> Result<FileRecord, AppError> {
        let start = Instant::now();
        let ttl = chrono::Duration::from_std(self.policy.resolve_ttl(new_file.ttl))
            .map_err(|e| AppError::Internal(format!("TTL out of range: {}", e)))?;

        let id = self.ids.new_id();
        tracing::Span::current().record("file.id", id.as_str());
        let storage_key = storage_key_for(&id, &new_file.display_name);

        let written = self.storage.save(&storage_key, reader).await?;

        let now = self.clock.now();
        let record = match now.checked_add_signed(ttl) {
            Some(expires_at) => FileRecord {
                id,
                display_name: new_file.display_name,
                storage_key,
                size_bytes: i64::try_from(written).unwrap_or(i64::MAX),
                content_type: new_file.content_type,
                owner_id: new_file.owner_id,
                one_time: new_file.one_time,
                expires_at,
                download_count: 0,
                created_at: now,
            },
            None => {
                self.compensate_upload(&storage_key).await;
                return Err(AppError::Internal("Expiry timestamp out of range".to_string()));
            }
        };

        if let Err(e) = self.metadata.put(&record).await {
            tracing::error!(
                error = %e,
                storage_key = %record.storage_key,
                "Failed to persist file metadata, removing uploaded blob"
            );
            self.compensate_upload(&record.storage_key).await;
            return Err(e);
        }

        tracing::info!(
            storage_key = %record.storage_key,
            size_bytes = record.size_bytes,
            expires_at = %record.expires_at,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File uploaded"
        );

        Ok(record)
    }

    async fn compensate_upload(&self, storage_key: &str) {
        match self.storage.delete(storage_key).await {
            Ok(()) => {
                tracing::debug!(storage_key = %storage_key, "Removed blob of failed upload");
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    storage_key = %storage_key,
                    "Failed to remove blob of failed upload, leaving it to the orphan sweep"
                );
            }
        }
    }

    /// Open a file for download.
    ///
    /// Returns the blob stream and the record as it was before this download
    /// was counted. An expired record yields [`AppError::Expired`] and is
    /// burned; a gone, condemned or dangling record yields
    /// [`AppError::NotFound`]. One-time files are burned once granted. The
    /// returned stream stays readable while that burn runs.
    #[tracing::instrument(skip(self), fields(file.id = %id))]
    pub async fn download(&self, id: &str) -> Result<(BlobStream, FileRecord), AppError> {
        let mut record = self
            .metadata
            .get(id)
            .await?
            .ok_or_else(|| not_found(id))?;

        let now = self.clock.now();
        if record.is_expired_at(now) {
            self.schedule_burn(id, BurnReason::Expired).await;
            return Err(expired(&record));
        }
        if record.is_condemned() {
            self.schedule_burn(id, BurnReason::OneTimeDownload).await;
            return Err(not_found(id));
        }

        let stream = match self.storage.open(&record.storage_key).await {
            Ok(stream) => stream,
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    storage_key = %record.storage_key,
                    "Blob missing for existing record, burning dangling metadata"
                );
                self.schedule_burn(id, BurnReason::DanglingMetadata).await;
                return Err(not_found(id));
            }
            Err(e) => return Err(e.into()),
        };

        match self.metadata.increment_download_count(id, now).await? {
            DownloadGate::Granted { previous_count } => {
                record.download_count = previous_count;
            }
            DownloadGate::Expired => {
                self.schedule_burn(id, BurnReason::Expired).await;
                return Err(expired(&record));
            }
            DownloadGate::Condemned => {
                tracing::debug!("Lost the one-time download race");
                return Err(not_found(id));
            }
            DownloadGate::Missing => return Err(not_found(id)),
        }

        if record.one_time {
            self.schedule_burn(id, BurnReason::OneTimeDownload).await;
        }

        tracing::info!(
            download_count = record.download_count + 1,
            one_time = record.one_time,
            "Download granted"
        );

        Ok((stream, record))
    }

    /// Delete a file's blob and record. Burning an unknown id succeeds.
    pub async fn burn(&self, id: &str) -> Result<BurnReport, AppError> {
        self.burn_with_reason(id, BurnReason::Manual).await
    }

    #[tracing::instrument(skip(self), fields(file.id = %id, reason = %reason))]
    async fn burn_with_reason(&self, id: &str, reason: BurnReason) -> Result<BurnReport, AppError> {
        let Some(record) = self.metadata.get(id).await? else {
            tracing::debug!("Nothing to burn, record already gone");
            return Ok(BurnReport::already_burned());
        };

        let blob_removed = match self.storage.delete(&record.storage_key).await {
            Ok(()) => true,
            Err(e) if e.is_not_found() => true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    storage_key = %record.storage_key,
                    "Failed to delete blob, removing metadata anyway"
                );
                false
            }
        };

        let existed = self.metadata.delete(id).await?;

        tracing::info!(
            storage_key = %record.storage_key,
            blob_removed,
            download_count = record.download_count,
            "File burned"
        );

        Ok(BurnReport {
            existed,
            blob_removed,
        })
    }

    /// Queue a burn. Never fails the caller: if the queue no longer accepts
    /// work the burn runs inline, and a failure there is only logged.
    pub async fn schedule_burn(&self, id: &str, reason: BurnReason) {
        match self.burn_queue.submit(id, reason).await {
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, file.id = %id, "Burn queue unavailable, burning inline");
                if let Err(e) = self.burn_with_reason(id, reason).await {
                    tracing::error!(error = %e, file.id = %id, "Inline burn failed");
                }
            }
        }
    }

    /// Record by id. Does not filter or burn expired records; see [`Self::is_expired`].
    #[tracing::instrument(skip(self), fields(file.id = %id))]
    pub async fn get_metadata(&self, id: &str) -> Result<FileRecord, AppError> {
        self.metadata.get(id).await?.ok_or_else(|| not_found(id))
    }

    /// Files owned by `owner_id`, newest first.
    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, AppError> {
        self.metadata.list_by_owner(owner_id).await
    }

    pub fn is_expired(&self, record: &FileRecord) -> bool {
        record.is_expired_at(self.clock.now())
    }

    /// Resolves once every queued burn has finished.
    pub async fn wait_for_pending_burns(&self) {
        self.burn_queue.wait_idle().await;
    }

    pub fn burn_queue_stats(&self) -> BurnQueueStats {
        self.burn_queue.stats()
    }

    /// Stop accepting burns and drain the queue.
    pub async fn shutdown(&self) {
        self.burn_queue.shutdown().await;
    }
}

#[async_trait]
impl BurnHandler for FileLifecycleManager {
    async fn burn_file(self: Arc<Self>, job: &BurnJob) -> Result<()> {
        self.burn_with_reason(&job.file_id, job.reason)
            .await
            .map(|_| ())
            .map_err(|e| JobError::from_app_error(e).into())
    }
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("File {} not found", id))
}

fn expired(record: &FileRecord) -> AppError {
    AppError::Expired {
        id: record.id.clone(),
        expired_at: record.expires_at,
    }
}
