//! Dropvault Core Library
//!
//! This crate provides the domain model, error types, configuration, clock,
//! identity generation and upload validation shared across all Dropvault components.

pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod job_error;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BurnQueueSettings, Config, DatabaseConfig, LifecyclePolicy, LogFormat, StorageConfig,
    SweepSettings,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use id::{is_valid_file_id, IdGenerator, RandomIdGenerator, FILE_ID_BYTES, FILE_ID_LEN};
pub use job_error::{JobError, JobResultExt};
pub use models::{BurnReason, FileRecord, NewFile};
pub use storage_types::StorageBackend;
pub use validation::{
    sanitize_display_name, validate_upload_size, UploadRequest, MAX_DISPLAY_NAME_LENGTH,
};
// Note: Storage, StorageError, StorageResult live in the dropvault-storage crate,
// MetadataStore lives in dropvault-db.
