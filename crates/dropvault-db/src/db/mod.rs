//! Database repositories for the data access layer
//
// Store contract shared by every backend
pub mod store;
//
// SQLite-backed file metadata
pub mod files;
//
// In-process file metadata
pub mod memory;
//
// Pool and migrations
pub mod setup;

pub use files::SqliteFileRepository;
pub use memory::MemoryFileRepository;
pub use setup::{connect_and_migrate, run_migrations, setup_database};
pub use store::{DownloadGate, MetadataStore};
