use chrono::{DateTime, Duration, TimeZone, Utc};
use dropvault_core::models::FileRecord;
use dropvault_core::AppError;
use dropvault_db::{
    connect_and_migrate, DownloadGate, MemoryFileRepository, MetadataStore, SqliteFileRepository,
};
use std::sync::Arc;
use tempfile::TempDir;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn record(id: &str, owner: &str, one_time: bool, created_at: DateTime<Utc>) -> FileRecord {
    FileRecord {
        id: id.to_string(),
        display_name: format!("{}.txt", id),
        storage_key: format!("{}.txt", id),
        size_bytes: 4,
        content_type: "text/plain".to_string(),
        owner_id: owner.to_string(),
        one_time,
        expires_at: created_at + Duration::hours(1),
        download_count: 0,
        created_at,
    }
}

async fn sqlite_store() -> (SqliteFileRepository, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = connect_and_migrate(&dir.path().join("meta.db")).await.unwrap();
    (SqliteFileRepository::new(pool), dir)
}

async fn check_put_get_delete(store: &dyn MetadataStore) {
    let r = record("a1", "alice", false, base_time());
    store.put(&r).await.unwrap();

    let fetched = store.get("a1").await.unwrap().unwrap();
    assert_eq!(fetched, r);

    let dup = store.put(&r).await;
    assert!(matches!(dup, Err(AppError::Conflict(_))));

    assert!(store.storage_key_exists("a1.txt").await.unwrap());
    assert!(store.delete("a1").await.unwrap());
    assert!(!store.delete("a1").await.unwrap());
    assert!(store.get("a1").await.unwrap().is_none());
    assert!(!store.storage_key_exists("a1.txt").await.unwrap());
}

async fn check_list_by_owner_newest_first(store: &dyn MetadataStore) {
    let t = base_time();
    store.put(&record("old", "alice", false, t)).await.unwrap();
    store
        .put(&record("new", "alice", false, t + Duration::minutes(5)))
        .await
        .unwrap();
    store
        .put(&record("tie", "alice", false, t + Duration::minutes(5)))
        .await
        .unwrap();
    store.put(&record("bob1", "bob", false, t)).await.unwrap();

    let ids: Vec<String> = store
        .list_by_owner("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["tie", "new", "old"]);
    assert!(store.list_by_owner("nobody").await.unwrap().is_empty());
}

async fn check_gate(store: &dyn MetadataStore) {
    let t = base_time();
    store.put(&record("multi", "alice", false, t)).await.unwrap();
    store.put(&record("once", "alice", true, t)).await.unwrap();

    for expected in 0..3 {
        assert_eq!(
            store.increment_download_count("multi", t).await.unwrap(),
            DownloadGate::Granted {
                previous_count: expected
            }
        );
    }
    assert_eq!(store.get("multi").await.unwrap().unwrap().download_count, 3);

    assert_eq!(
        store.increment_download_count("once", t).await.unwrap(),
        DownloadGate::Granted { previous_count: 0 }
    );
    assert_eq!(
        store.increment_download_count("once", t).await.unwrap(),
        DownloadGate::Condemned
    );
    assert_eq!(store.get("once").await.unwrap().unwrap().download_count, 1);

    let expires_at = t + Duration::hours(1);
    assert!(matches!(
        store
            .increment_download_count("multi", expires_at - Duration::milliseconds(1))
            .await
            .unwrap(),
        DownloadGate::Granted { .. }
    ));
    assert_eq!(
        store
            .increment_download_count("multi", expires_at)
            .await
            .unwrap(),
        DownloadGate::Expired
    );
    assert_eq!(
        store.increment_download_count("ghost", t).await.unwrap(),
        DownloadGate::Missing
    );
}

async fn check_reconciliation_queries(store: &dyn MetadataStore) {
    let t = base_time();
    store.put(&record("fresh", "alice", false, t)).await.unwrap();
    store
        .put(&record("stale", "alice", false, t - Duration::hours(3)))
        .await
        .unwrap();
    store
        .put(&record("staler", "alice", false, t - Duration::hours(4)))
        .await
        .unwrap();
    store.put(&record("burnt", "alice", true, t)).await.unwrap();
    store.increment_download_count("burnt", t).await.unwrap();

    let expired: Vec<String> = store
        .list_expired(t, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(expired, vec!["staler", "stale"]);
    assert_eq!(store.list_expired(t, 1).await.unwrap().len(), 1);

    let condemned = store.list_condemned(10).await.unwrap();
    assert_eq!(condemned.len(), 1);
    assert_eq!(condemned[0].id, "burnt");
}

async fn check_single_winner(store: Arc<dyn MetadataStore>) {
    let t = base_time();
    store.put(&record("race", "alice", true, t)).await.unwrap();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.increment_download_count("race", t).await.unwrap() })
        })
        .collect();

    let outcomes = futures::future::join_all(handles).await;
    let granted = outcomes
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|gate| matches!(gate, DownloadGate::Granted { .. }))
        .count();
    assert_eq!(granted, 1);
    assert_eq!(store.get("race").await.unwrap().unwrap().download_count, 1);
}

#[tokio::test]
async fn test_memory_put_get_delete() {
    check_put_get_delete(&MemoryFileRepository::new()).await;
}

#[tokio::test]
async fn test_sqlite_put_get_delete() {
    let (store, _dir) = sqlite_store().await;
    check_put_get_delete(&store).await;
}

#[tokio::test]
async fn test_memory_list_by_owner() {
    check_list_by_owner_newest_first(&MemoryFileRepository::new()).await;
}

#[tokio::test]
async fn test_sqlite_list_by_owner() {
    let (store, _dir) = sqlite_store().await;
    check_list_by_owner_newest_first(&store).await;
}

#[tokio::test]
async fn test_memory_download_gate() {
    check_gate(&MemoryFileRepository::new()).await;
}

#[tokio::test]
async fn test_sqlite_download_gate() {
    let (store, _dir) = sqlite_store().await;
    check_gate(&store).await;
}

#[tokio::test]
async fn test_memory_reconciliation_queries() {
    check_reconciliation_queries(&MemoryFileRepository::new()).await;
}

#[tokio::test]
async fn test_sqlite_reconciliation_queries() {
    let (store, _dir) = sqlite_store().await;
    check_reconciliation_queries(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_gate_has_single_winner() {
    check_single_winner(Arc::new(MemoryFileRepository::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_gate_has_single_winner() {
    let (store, _dir) = sqlite_store().await;
    check_single_winner(Arc::new(store)).await;
}

#[tokio::test]
async fn test_sqlite_persists_across_pools() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.db");
    {
        let store = SqliteFileRepository::new(connect_and_migrate(&path).await.unwrap());
        store
            .put(&record("kept", "alice", false, base_time()))
            .await
            .unwrap();
        store.pool().close().await;
    }
    let store = SqliteFileRepository::new(connect_and_migrate(&path).await.unwrap());
    assert_eq!(store.list_by_owner("alice").await.unwrap().len(), 1);
    assert_eq!(
        store.get("kept").await.unwrap().unwrap().expires_at,
        base_time() + Duration::hours(1)
    );
}

#[tokio::test]
async fn test_memory_failure_switch() {
    let store = MemoryFileRepository::new();
    store.set_fail_puts(true);
    assert!(store
        .put(&record("x", "alice", false, base_time()))
        .await
        .is_err());
    assert!(store.is_empty());
}
