//! Caller identity
//!
//! Authentication happens upstream; this crate only reads the owner id the
//! auth layer forwarded.

pub mod owner;

pub use owner::OwnerContext;
