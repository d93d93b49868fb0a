use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one uploaded file.
///
/// `id`, `storage_key`, `one_time`, `expires_at` and `created_at` never change
/// after creation. `download_count` only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub display_name: String,
    pub storage_key: String,
    pub size_bytes: i64,
    /// As supplied by the uploader. Never checked against the bytes.
    pub content_type: String,
    pub owner_id: String,
    pub one_time: bool,
    pub expires_at: DateTime<Utc>,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Expired at `now` when `now >= expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// A one-time file that has already been handed out once.
    pub fn is_condemned(&self) -> bool {
        self.one_time && self.download_count >= 1
    }

    /// Whether a new download may still be granted at `now`.
    pub fn is_downloadable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now) && !self.is_condemned()
    }
}

/// Input to an upload.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub display_name: String,
    pub content_type: String,
    pub owner_id: String,
    pub one_time: bool,
    /// Requested lifetime. `None` takes the policy default; anything else is clamped.
    pub ttl: Option<Duration>,
}

impl NewFile {
    pub fn new(
        display_name: impl Into<String>,
        content_type: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            content_type: content_type.into(),
            owner_id: owner_id.into(),
            one_time: false,
            ttl: None,
        }
    }

    pub fn one_time(mut self, one_time: bool) -> Self {
        self.one_time = one_time;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}
