//! Dropvault API Library
//!
//! This crate provides the HTTP API handlers, middleware, and application setup.
//! Handlers stay thin: every decision about expiry, one-time burns and
//! compensation is made by `FileLifecycleManager`.

mod handlers;

// Public modules
pub mod auth;
pub mod constants;
pub mod error;
pub mod setup;
pub mod state;

// Re-exports
pub use dropvault_infra::ErrorResponse;
pub use error::HttpAppError;
pub use state::AppState;
