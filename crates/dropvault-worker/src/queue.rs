//! Burn queue: bounded channel, worker pool, retry, dedup and drain.
//!
//! Jobs flow through a bounded `mpsc` channel to a dispatcher that only pulls
//! the next job once a worker permit is free, so a full pool backs up into the
//! channel and then into `submit`. A file id that is already queued or running
//! is not queued again.
//!
//! Shutdown: [`BurnQueue::shutdown`] stops intake, waits for every queued and
//! running job to finish, then stops the dispatcher.

use anyhow::{anyhow, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dropvault_core::{BurnQueueSettings, BurnReason, JobError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::context::{BurnHandler, BurnJob};

/// Computes the delay before retry number `retry` (0-based): `base * 2^retry`, capped at `max`.
#[inline]
pub(crate) fn compute_retry_backoff(retry: u32, base: Duration, max: Duration) -> Duration {
    2_u32
        .checked_pow(retry)
        .and_then(|factor| base.checked_mul(factor))
        .unwrap_or(max)
        .min(max)
}

#[derive(Clone, Debug)]
pub struct BurnQueueConfig {
    pub max_workers: usize,
    pub capacity: usize,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for BurnQueueConfig {
    fn default() -> Self {
        BurnQueueConfig::from(&BurnQueueSettings::default())
    }
}

impl From<&BurnQueueSettings> for BurnQueueConfig {
    fn from(settings: &BurnQueueSettings) -> Self {
        Self {
            max_workers: settings.max_workers.max(1),
            capacity: settings.capacity.max(1),
            max_retries: settings.max_retries,
            retry_base_delay: settings.retry_base_delay,
            retry_max_delay: settings.retry_max_delay,
            timeout: settings.timeout,
        }
    }
}

/// Counters since the queue started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BurnQueueStats {
    pub submitted: u64,
    pub deduplicated: u64,
    pub completed: u64,
    pub retried: u64,
    pub failed: u64,
    /// Jobs queued or running right now.
    pub pending: usize,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    deduplicated: AtomicU64,
    completed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
}

struct Shared {
    pending: DashMap<String, ()>,
    idle: Notify,
    closed: AtomicBool,
    counters: Counters,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn finish(&self, file_id: &str) {
        self.pending.remove(file_id);
        if self.pending.is_empty() {
            self.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct BurnQueue {
    tx: mpsc::Sender<BurnJob>,
    shutdown_tx: mpsc::Sender<()>,
    shared: Arc<Shared>,
}

impl BurnQueue {
    /// Start the dispatcher and return a handle for submitting jobs.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: BurnQueueConfig, handler: Weak<dyn BurnHandler>) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let shared = Arc::new(Shared {
            pending: DashMap::new(),
            idle: Notify::new(),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
            dispatcher: Mutex::new(None),
        });

        let handle = tokio::spawn(Self::worker_pool(
            config,
            handler,
            rx,
            shutdown_rx,
            shared.clone(),
        ));
        *shared.dispatcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);

        Self {
            tx,
            shutdown_tx,
            shared,
        }
    }

    /// Queue a burn. Returns `Ok(false)` when the file is already queued or running.
    ///
    /// Waits for channel capacity instead of dropping the job.
    #[tracing::instrument(skip(self, file_id, reason), fields(file.id = %file_id, reason = %reason))]
    pub async fn submit(&self, file_id: &str, reason: BurnReason) -> Result<bool> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(anyhow!("Burn queue is shut down"));
        }

        match self.shared.pending.entry(file_id.to_string()) {
            Entry::Occupied(_) => {
                self.shared
                    .counters
                    .deduplicated
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Burn already pending, not queued again");
                return Ok(false);
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }

        // `shutdown` may have closed the queue after the first check but before
        // the entry became visible to its drain.
        if self.shared.closed.load(Ordering::SeqCst) {
            self.shared.finish(file_id);
            return Err(anyhow!("Burn queue is shut down"));
        }

        if let Err(e) = self.tx.send(BurnJob::new(file_id, reason)).await {
            self.shared.finish(file_id);
            tracing::error!(error = %e, "Failed to enqueue burn");
            return Err(anyhow!("Burn queue is not accepting jobs"));
        }

        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Burn submitted to queue");
        Ok(true)
    }

    pub fn stats(&self) -> BurnQueueStats {
        let c = &self.shared.counters;
        BurnQueueStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            deduplicated: c.deduplicated.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            retried: c.retried.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            pending: self.shared.pending.len(),
        }
    }

    /// Resolves once nothing is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.pending.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting jobs, drain everything already accepted, then stop the dispatcher.
    pub async fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(pending = self.shared.pending.len(), "Draining burn queue");
        self.wait_idle().await;
        let _ = self.shutdown_tx.send(()).await;

        let handle = self
            .shared
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Burn queue dispatcher panicked");
            }
        }
        tracing::info!("Burn queue stopped");
    }

    async fn worker_pool(
        config: BurnQueueConfig,
        handler: Weak<dyn BurnHandler>,
        mut rx: mpsc::Receiver<BurnJob>,
        mut shutdown_rx: mpsc::Receiver<()>,
        shared: Arc<Shared>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            capacity = config.capacity,
            max_retries = config.max_retries,
            "Burn queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("Burn queue worker pool shutting down");
                    break;
                }
                job = rx.recv() => {
                    let Some(job) = job else {
                        tracing::debug!("All burn queue handles dropped");
                        break;
                    };
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            shared.finish(&job.file_id);
                            break;
                        }
                    };
                    let handler = handler.clone();
                    let config = config.clone();
                    let shared = shared.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        Self::process_with_retry(&job, &handler, &config, &shared).await;
                        shared.finish(&job.file_id);
                    });
                }
            }
        }

        tracing::info!("Burn queue worker pool stopped");
    }

    #[tracing::instrument(skip(job, handler, config, shared), fields(file.id = %job.file_id, reason = %job.reason))]
    async fn process_with_retry(
        job: &BurnJob,
        handler: &Weak<dyn BurnHandler>,
        config: &BurnQueueConfig,
        shared: &Shared,
    ) {
        let mut attempt: u32 = 0;
        loop {
            let Some(ctx) = handler.upgrade() else {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("BurnHandler was dropped, cannot process burn");
                return;
            };

            let start = std::time::Instant::now();
            let result = tokio::time::timeout(config.timeout, ctx.burn_file(job)).await;

            let err = match result {
                Ok(Ok(())) => {
                    shared.counters.completed.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(
                        attempt = attempt + 1,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Burn completed"
                    );
                    return;
                }
                Ok(Err(e)) => e,
                Err(_) => anyhow!("Burn timed out after {:?}", config.timeout),
            };

            let retryable = JobError::is_retryable(&err);
            if !retryable || attempt >= config.max_retries {
                shared.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    error = %err,
                    attempts = attempt + 1,
                    unrecoverable = !retryable,
                    "Burn failed, giving up"
                );
                return;
            }

            let backoff =
                compute_retry_backoff(attempt, config.retry_base_delay, config.retry_max_delay);
            tracing::warn!(
                error = %err,
                retry_count = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                "Burn failed, scheduling retry"
            );
            shared.counters.retried.fetch_add(1, Ordering::Relaxed);
            sleep(backoff).await;
            attempt += 1;
        }
    }
}
