//! Test helpers: build AppState and router for integration tests.
//!
//! Every test gets its own in-memory stores and a manual clock, so no
//! database or filesystem is needed: `cargo test -p dropvault-api`.

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use chrono::{TimeZone, Utc};
use dropvault_api::constants::{self, OWNER_HEADER};
use dropvault_api::setup::routes;
use dropvault_api::AppState;
use dropvault_core::{Config, ManualClock};
use dropvault_db::MemoryFileRepository;
use dropvault_services::FileLifecycleManager;
use dropvault_storage::MemoryStorage;
use dropvault_worker::BurnQueueConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// API path prefix for tests (e.g. `/api/upload`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server plus handles on everything behind it.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub metadata: Arc<MemoryFileRepository>,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Multipart upload of `data` as `file_name`, plus extra text fields.
    pub async fn upload(
        &self,
        owner: &str,
        file_name: &str,
        data: &[u8],
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let part = Part::bytes(bytes::Bytes::copy_from_slice(data))
            .file_name(file_name.to_string())
            .mime_type("text/plain");
        let mut form = MultipartForm::new();
        for (name, value) in fields {
            form = form.add_text(name.to_string(), value.to_string());
        }
        let form = form.add_part("file", part);

        self.server
            .post(&api_path("/upload"))
            .add_header(OWNER_HEADER, owner)
            .multipart(form)
            .await
    }

    /// Upload and return the `id` from the 201 response.
    pub async fn upload_ok(&self, owner: &str, file_name: &str, data: &[u8], fields: &[(&str, &str)]) -> String {
        let response = self.upload(owner, file_name, data, fields).await;
        assert_eq!(response.status_code(), 201, "upload failed: {}", response.text());
        let body: serde_json::Value = response.json();
        body["id"]
            .as_str()
            .expect("Expected 'id' in upload response")
            .to_string()
    }
}

pub fn create_test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("ENVIRONMENT", "test"),
        ("DATABASE_URL", "sqlite::memory:"),
        ("STORAGE_BACKEND", "memory"),
        ("MAX_FILE_SIZE_MB", "1"),
        ("FILE_TTL_SECONDS", "3600"),
        ("MAX_FILE_TTL_SECONDS", "86400"),
        ("SWEEP_INTERVAL_SECS", "0"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
        .expect("Failed to build test config")
}

/// Setup test app with in-memory stores and a clock fixed at 2025-03-01 12:00 UTC.
pub async fn setup_test_app() -> TestApp {
    let config = create_test_config();

    let metadata = Arc::new(MemoryFileRepository::new());
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
    ));

    let files = FileLifecycleManager::builder(metadata.clone(), storage.clone())
        .clock(clock.clone())
        .policy(config.policy)
        .burn_queue(BurnQueueConfig {
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(5),
            ..BurnQueueConfig::from(&config.burn_queue)
        })
        .build();

    let state = Arc::new(AppState::new(config.clone(), files));
    let router = routes::setup_routes(&config, state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        state,
        metadata,
        storage,
        clock,
    }
}
