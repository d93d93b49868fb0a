use std::sync::Arc;
use std::time::Instant;

use dropvault_core::{AppError, BurnReason, SweepSettings};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::lifecycle::FileLifecycleManager;

/// Work done by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Expired records handed to the burn queue.
    pub expired: usize,
    /// Condemned one-time records handed to the burn queue.
    pub condemned: usize,
    /// Blobs with no metadata row that were deleted.
    pub orphans_removed: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expired + self.condemned + self.orphans_removed
    }
}

/// Periodic reconciliation between the metadata store and the blob store.
///
/// Reclaims expired files nobody asked for again, re-schedules burns that were
/// lost to a crash, and removes blobs left behind between a blob write and its
/// metadata write.
#[derive(Clone)]
pub struct SweepService {
    manager: Arc<FileLifecycleManager>,
    settings: SweepSettings,
}

impl SweepService {
    pub fn new(manager: Arc<FileLifecycleManager>, settings: SweepSettings) -> Self {
        Self { manager, settings }
    }

    /// Start the background sweep loop.
    /// Returns `None` when the interval is zero (sweep disabled).
    pub fn start(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if self.settings.interval.is_zero() {
            tracing::info!("Reconciliation sweep disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut sweep_interval = interval(self.settings.interval);
            sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                sweep_interval.tick().await;
                tracing::debug!("Starting scheduled reconciliation sweep");
                self.run_once().await;
            }
        }))
    }

    /// Run every sweep category once. A failing category is logged and counted as zero.
    #[tracing::instrument(skip(self), fields(sweep.batch_size = self.settings.batch_size))]
    pub async fn run_once(&self) -> SweepReport {
        let start = Instant::now();

        let expired = match self.sweep_expired().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to sweep expired files");
                0
            }
        };

        let condemned = match self.sweep_condemned().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to sweep condemned files");
                0
            }
        };

        let orphans_removed = match self.sweep_orphans().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to sweep orphan blobs");
                0
            }
        };

        let report = SweepReport {
            expired,
            condemned,
            orphans_removed,
        };

        if report.total() > 0 {
            tracing::info!(
                expired,
                condemned,
                orphans_removed,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Reconciliation sweep completed"
            );
        } else {
            tracing::debug!("Reconciliation sweep found nothing to do");
        }

        report
    }

    #[tracing::instrument(skip(self), fields(sweep.category = "expired"))]
    async fn sweep_expired(&self) -> Result<usize, AppError> {
        let now = self.manager.now();
        let expired = self
            .manager
            .metadata()
            .list_expired(now, self.settings.batch_size)
            .await?;

        for record in &expired {
            tracing::debug!(
                file.id = %record.id,
                expires_at = %record.expires_at,
                "Scheduling burn of expired file"
            );
            self.manager.schedule_burn(&record.id, BurnReason::Expired).await;
        }

        Ok(expired.len())
    }

    #[tracing::instrument(skip(self), fields(sweep.category = "condemned"))]
    async fn sweep_condemned(&self) -> Result<usize, AppError> {
        let condemned = self
            .manager
            .metadata()
            .list_condemned(self.settings.batch_size)
            .await?;

        for record in &condemned {
            tracing::debug!(file.id = %record.id, "Scheduling burn of condemned file");
            self.manager.schedule_burn(&record.id, BurnReason::Sweep).await;
        }

        Ok(condemned.len())
    }

    /// Blobs younger than the grace period are never touched, so an upload
    /// between its blob write and its metadata write is safe.
    #[tracing::instrument(skip(self), fields(sweep.category = "orphans"))]
    async fn sweep_orphans(&self) -> Result<usize, AppError> {
        let now = self.manager.now();
        let storage = self.manager.storage();
        let entries = storage.list().await?;

        let mut removed = 0;
        for entry in entries {
            if removed >= self.settings.batch_size {
                break;
            }

            let old_enough = (now - entry.modified_at)
                .to_std()
                .map(|age| age >= self.settings.orphan_grace_period)
                .unwrap_or(false);
            if !old_enough {
                continue;
            }

            if self.manager.metadata().storage_key_exists(&entry.key).await? {
                continue;
            }

            match storage.delete(&entry.key).await {
                Ok(()) => {
                    tracing::info!(
                        storage_key = %entry.key,
                        size = entry.size,
                        modified_at = %entry.modified_at,
                        "Deleted orphan blob"
                    );
                    removed += 1;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        storage_key = %entry.key,
                        "Failed to delete orphan blob"
                    );
                }
            }
        }

        Ok(removed)
    }
}
