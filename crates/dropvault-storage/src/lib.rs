//! Dropvault Storage Library
//!
//! Blob store abstraction and its implementations: a local filesystem store for
//! real deployments and an in-memory store for tests and throwaway runs.
//!
//! # Storage key format
//!
//! Keys are flat: `{file_id}` or `{file_id}.{ext}`, where `ext` is a short
//! lowercase alphanumeric suffix taken from the uploaded file name. Keys must not
//! contain `..`, `/` or `\`. Key derivation lives in the `keys` module so every
//! backend agrees on it.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use dropvault_core::StorageBackend;
pub use factory::create_storage;
pub use keys::{extension_of, storage_key_for, validate_storage_key};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
pub use traits::{BlobEntry, BlobReader, BlobStream, Storage, StorageError, StorageResult};
