//! Dropvault Services Layer
//!
//! This crate is the **business service layer**: it owns the file lifecycle
//! (upload, download, burn) and the reconciliation sweep. Stores are injected
//! at construction so the HTTP and CLI front ends stay thin and the same logic
//! runs against SQLite + disk in production and in-memory stores in tests.

pub mod lifecycle;

#[cfg(feature = "cleanup")]
pub mod cleanup;

#[cfg(feature = "cleanup")]
pub use cleanup::{SweepReport, SweepService};
pub use lifecycle::{BurnReport, FileLifecycleManager, FileLifecycleManagerBuilder};
