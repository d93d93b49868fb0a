use anyhow::Result;
use async_trait::async_trait;
use dropvault_core::{BurnReason, JobError};
use dropvault_worker::{BurnHandler, BurnJob, BurnQueue, BurnQueueConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Scriptable handler: fails the first `fail_times` attempts per file.
struct TestHandler {
    attempts: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
    fail_times: usize,
    unrecoverable: bool,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
}

impl TestHandler {
    fn new() -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            total_calls: AtomicUsize::new(0),
            fail_times: 0,
            unrecoverable: false,
            delay: Duration::ZERO,
            gate: None,
        }
    }

    fn calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BurnHandler for TestHandler {
    async fn burn_file(self: Arc<Self>, job: &BurnJob) -> Result<()> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await?;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(job.file_id.clone()).or_insert(0);
            *n += 1;
            *n
        };
        if attempt <= self.fail_times {
            if self.unrecoverable {
                return Err(JobError::unrecoverable(anyhow::anyhow!("bad key")).into());
            }
            return Err(anyhow::anyhow!("transient failure"));
        }
        Ok(())
    }
}

fn fast_config() -> BurnQueueConfig {
    BurnQueueConfig {
        max_workers: 2,
        capacity: 4,
        max_retries: 3,
        retry_base_delay: Duration::from_millis(1),
        retry_max_delay: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
    }
}

fn start(handler: &Arc<TestHandler>, config: BurnQueueConfig) -> BurnQueue {
    let weak: Weak<dyn BurnHandler> = Arc::downgrade(handler) as Weak<dyn BurnHandler>;
    BurnQueue::start(config, weak)
}

#[tokio::test]
async fn test_duplicate_submissions_run_once() {
    let gate = Arc::new(Semaphore::new(0));
    let handler = Arc::new(TestHandler {
        gate: Some(gate.clone()),
        ..TestHandler::new()
    });
    let queue = start(&handler, fast_config());

    assert!(queue.submit("f1", BurnReason::OneTimeDownload).await.unwrap());
    for _ in 0..5 {
        assert!(!queue.submit("f1", BurnReason::OneTimeDownload).await.unwrap());
    }

    gate.add_permits(10);
    queue.wait_idle().await;

    assert_eq!(handler.calls(), 1);
    let stats = queue.stats();
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.deduplicated, 5);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 0);

    // Once finished, the same id can be queued again.
    assert!(queue.submit("f1", BurnReason::Manual).await.unwrap());
    queue.wait_idle().await;
    assert_eq!(handler.calls(), 2);
}

#[tokio::test]
async fn test_recoverable_failures_retry_then_succeed() {
    let handler = Arc::new(TestHandler {
        fail_times: 2,
        ..TestHandler::new()
    });
    let queue = start(&handler, fast_config());

    queue.submit("f1", BurnReason::Expired).await.unwrap();
    queue.wait_idle().await;

    assert_eq!(handler.calls(), 3);
    let stats = queue.stats();
    assert_eq!(stats.retried, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let handler = Arc::new(TestHandler {
        fail_times: 100,
        ..TestHandler::new()
    });
    let queue = start(&handler, fast_config());

    queue.submit("f1", BurnReason::Expired).await.unwrap();
    queue.wait_idle().await;

    assert_eq!(handler.calls(), 4);
    assert_eq!(queue.stats().failed, 1);
    assert_eq!(queue.stats().retried, 3);
}

#[tokio::test]
async fn test_unrecoverable_failure_is_not_retried() {
    let handler = Arc::new(TestHandler {
        fail_times: 100,
        unrecoverable: true,
        ..TestHandler::new()
    });
    let queue = start(&handler, fast_config());

    queue.submit("f1", BurnReason::Sweep).await.unwrap();
    queue.wait_idle().await;

    assert_eq!(handler.calls(), 1);
    assert_eq!(queue.stats().failed, 1);
    assert_eq!(queue.stats().retried, 0);
}

#[tokio::test]
async fn test_attempt_timeout_counts_as_failure() {
    let handler = Arc::new(TestHandler {
        delay: Duration::from_millis(200),
        ..TestHandler::new()
    });
    let config = BurnQueueConfig {
        max_retries: 0,
        timeout: Duration::from_millis(20),
        ..fast_config()
    };
    let queue = start(&handler, config);

    queue.submit("slow", BurnReason::Manual).await.unwrap();
    queue.wait_idle().await;

    assert_eq!(queue.stats().failed, 1);
    assert_eq!(queue.stats().completed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_drains_queued_work() {
    let handler = Arc::new(TestHandler {
        delay: Duration::from_millis(5),
        ..TestHandler::new()
    });
    let queue = start(&handler, fast_config());

    for i in 0..20 {
        queue
            .submit(&format!("f{}", i), BurnReason::OneTimeDownload)
            .await
            .unwrap();
    }

    queue.shutdown().await;

    assert_eq!(handler.calls(), 20);
    assert_eq!(queue.stats().completed, 20);
    assert!(queue.submit("late", BurnReason::Manual).await.is_err());

    // Second shutdown is a no-op.
    queue.shutdown().await;
}

#[tokio::test]
async fn test_dropped_handler_fails_jobs() {
    let handler = Arc::new(TestHandler::new());
    let queue = start(&handler, fast_config());
    drop(handler);

    queue.submit("orphan", BurnReason::Manual).await.unwrap();
    queue.wait_idle().await;

    assert_eq!(queue.stats().failed, 1);
}

#[tokio::test]
async fn test_wait_idle_returns_immediately_when_empty() {
    let handler = Arc::new(TestHandler::new());
    let queue = start(&handler, fast_config());
    tokio::time::timeout(Duration::from_secs(1), queue.wait_idle())
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_submit_racing_shutdown_never_loses_accepted_jobs() {
    for round in 0..20 {
        let handler = Arc::new(TestHandler::new());
        let queue = start(&handler, fast_config());

        let submitters: Vec<_> = (0..8)
            .map(|i| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    queue
                        .submit(&format!("r{}-f{}", round, i), BurnReason::Expired)
                        .await
                })
            })
            .collect();
        queue.shutdown().await;

        let mut accepted = 0;
        for handle in submitters {
            if let Ok(true) = handle.await.unwrap() {
                accepted += 1;
            }
        }

        // Every accepted job ran; rejected ones are left to the caller.
        assert_eq!(handler.calls(), accepted);
        assert_eq!(queue.stats().completed, accepted as u64);
        assert_eq!(queue.stats().pending, 0);
    }
}
