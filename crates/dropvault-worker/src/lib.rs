//! Dropvault Worker Library
//!
//! Bounded background queue that burns files off the request path. Failures are
//! retried with capped exponential backoff, logged and counted instead of being
//! lost with a detached task.

pub mod context;
pub mod queue;

pub use context::{BurnHandler, BurnJob};
pub use queue::{BurnQueue, BurnQueueConfig, BurnQueueStats};
