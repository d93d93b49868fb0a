//! Dropvault metadata store
//!
//! The [`MetadataStore`] contract plus a SQLite implementation for real use and
//! a `DashMap` implementation for tests and ephemeral runs.

pub mod db;

pub use db::{
    connect_and_migrate, run_migrations, setup_database, DownloadGate, MemoryFileRepository,
    MetadataStore, SqliteFileRepository,
};
