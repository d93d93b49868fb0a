//! Burn handler trait
//!
//! The lifecycle manager implements this trait. The worker calls `burn_file`
//! for each job it takes off the queue.

use anyhow::Result;
use async_trait::async_trait;
use dropvault_core::BurnReason;
use std::sync::Arc;

/// One unit of work for the burn queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnJob {
    pub file_id: String,
    pub reason: BurnReason,
}

impl BurnJob {
    pub fn new(file_id: impl Into<String>, reason: BurnReason) -> Self {
        Self {
            file_id: file_id.into(),
            reason,
        }
    }
}

/// Context for burn dispatch.
///
/// The worker holds a weak reference so the queue never keeps its owner alive.
/// Return a [`dropvault_core::JobError::unrecoverable`] to stop retries.
#[async_trait]
pub trait BurnHandler: Send + Sync {
    async fn burn_file(self: Arc<Self>, job: &BurnJob) -> Result<()>;
}
