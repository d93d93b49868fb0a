use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use dropvault_core::{Clock, FileRecord, ManualClock, NewFile, SweepSettings};
use dropvault_db::{MemoryFileRepository, MetadataStore};
use dropvault_services::{FileLifecycleManager, SweepReport, SweepService};
use dropvault_storage::{BlobReader, MemoryStorage, Storage};
use dropvault_worker::BurnQueueConfig;

struct Harness {
    manager: Arc<FileLifecycleManager>,
    metadata: Arc<MemoryFileRepository>,
    storage: Arc<MemoryStorage>,
    clock: Arc<ManualClock>,
    sweep: SweepService,
}

fn harness() -> Harness {
    let metadata = Arc::new(MemoryFileRepository::new());
    let storage = Arc::new(MemoryStorage::new());
    // Blobs saved through the manager carry wall-clock mtimes, so start there.
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let manager = FileLifecycleManager::builder(metadata.clone(), storage.clone())
        .clock(clock.clone())
        .burn_queue(BurnQueueConfig {
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(5),
            ..BurnQueueConfig::default()
        })
        .build();
    let sweep = SweepService::new(
        manager.clone(),
        SweepSettings {
            interval: Duration::from_secs(300),
            batch_size: 100,
            orphan_grace_period: Duration::from_secs(3600),
        },
    );
    Harness {
        manager,
        metadata,
        storage,
        clock,
        sweep,
    }
}

fn reader(data: &[u8]) -> BlobReader {
    Box::pin(std::io::Cursor::new(data.to_vec()))
}

#[tokio::test]
async fn test_sweep_burns_expired_files_nobody_downloaded() {
    let h = harness();
    let stale = h
        .manager
        .upload(reader(b"old"), NewFile::new("old.txt", "text/plain", "alice"))
        .await
        .unwrap();

    h.clock.advance(Duration::from_secs(1800));
    let fresh = h
        .manager
        .upload(reader(b"new"), NewFile::new("new.txt", "text/plain", "alice"))
        .await
        .unwrap();

    h.clock.advance(Duration::from_secs(1801));
    let report = h.sweep.run_once().await;
    assert_eq!(report.expired, 1);

    h.manager.wait_for_pending_burns().await;
    assert!(h.metadata.get(&stale.id).await.unwrap().is_none());
    assert!(h.storage.get(&stale.storage_key).is_none());
    assert!(h.metadata.get(&fresh.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_sweep_burns_condemned_records_left_by_a_lost_burn() {
    let h = harness();
    let now = h.clock.now();
    let id = "c0ffee".repeat(5) + "00";
    let record = FileRecord {
        id: id.clone(),
        display_name: "once.txt".into(),
        storage_key: format!("{}.txt", id),
        size_bytes: 4,
        content_type: "text/plain".into(),
        owner_id: "alice".into(),
        one_time: true,
        expires_at: now + chrono::Duration::hours(1),
        download_count: 1,
        created_at: now,
    };
    h.storage.insert(&record.storage_key, &b"gone"[..], now);
    h.metadata.put(&record).await.unwrap();

    let report = h.sweep.run_once().await;
    assert_eq!(report.condemned, 1);
    assert_eq!(report.expired, 0);

    h.manager.wait_for_pending_burns().await;
    assert!(h.metadata.is_empty());
    assert!(h.storage.is_empty());
}

#[tokio::test]
async fn test_sweep_removes_only_old_orphan_blobs() {
    let h = harness();
    let now = h.clock.now();

    let kept = h
        .manager
        .upload(reader(b"live"), NewFile::new("live.txt", "text/plain", "alice"))
        .await
        .unwrap();

    let old_orphan = format!("{}.bin", "a".repeat(32));
    let young_orphan = format!("{}.bin", "b".repeat(32));
    h.storage
        .insert(&old_orphan, &b"leak"[..], now - chrono::Duration::hours(2));
    h.storage
        .insert(&young_orphan, &b"upload in flight"[..], now - chrono::Duration::minutes(1));

    let report = h.sweep.run_once().await;
    assert_eq!(
        report,
        SweepReport {
            expired: 0,
            condemned: 0,
            orphans_removed: 1,
        }
    );

    assert!(h.storage.get(&old_orphan).is_none());
    assert!(h.storage.get(&young_orphan).is_some());
    assert!(h.storage.get(&kept.storage_key).is_some());
}

#[tokio::test]
async fn test_sweep_never_deletes_blob_with_metadata() {
    let h = harness();
    let record = h
        .manager
        .upload(
            reader(b"live"),
            NewFile::new("live.txt", "text/plain", "alice").with_ttl(Duration::from_secs(86_400)),
        )
        .await
        .unwrap();

    // Older than the grace period, but the record still points at it.
    h.clock.advance(Duration::from_secs(2 * 3600));

    let report = h.sweep.run_once().await;
    assert_eq!(report, SweepReport::default());
    assert!(h.storage.exists(&record.storage_key).await.unwrap());
}

#[tokio::test]
async fn test_sweep_on_empty_stores_does_nothing() {
    let h = harness();
    let report = h.sweep.run_once().await;
    assert_eq!(report, SweepReport::default());
    assert_eq!(report.total(), 0);
}

#[tokio::test]
async fn test_zero_interval_disables_background_sweep() {
    let h = harness();
    let disabled = Arc::new(SweepService::new(
        h.manager.clone(),
        SweepSettings {
            interval: Duration::ZERO,
            ..SweepSettings::default()
        },
    ));
    assert!(disabled.start().is_none());

    let enabled = Arc::new(h.sweep.clone());
    let handle = enabled.start().unwrap();
    handle.abort();
}
