//! Lifecycle manager and background sweep wiring

use crate::state::AppState;
use dropvault_core::Config;
use dropvault_db::MetadataStore;
use dropvault_services::{FileLifecycleManager, SweepService};
use dropvault_storage::Storage;
use dropvault_worker::BurnQueueConfig;
use std::sync::Arc;

/// Build the lifecycle manager on top of the given stores and start the sweep.
pub fn initialize_services(
    config: &Config,
    metadata: Arc<dyn MetadataStore>,
    storage: Arc<dyn Storage>,
) -> Arc<AppState> {
    let files = FileLifecycleManager::builder(metadata, storage)
        .policy(config.policy)
        .burn_queue(BurnQueueConfig::from(&config.burn_queue))
        .build();

    let state = Arc::new(AppState::new(config.clone(), files.clone()));

    let sweep = Arc::new(SweepService::new(files, config.sweep.clone()));
    match sweep.start() {
        Some(handle) => {
            tracing::info!(
                interval_secs = config.sweep.interval.as_secs(),
                batch_size = config.sweep.batch_size,
                orphan_grace_period_secs = config.sweep.orphan_grace_period.as_secs(),
                "Reconciliation sweep started"
            );
            state.set_sweep_handle(handle);
        }
        None => tracing::warn!("Reconciliation sweep disabled (SWEEP_INTERVAL_SECS=0)"),
    }

    tracing::info!(
        default_ttl_secs = config.policy.default_ttl.as_secs(),
        max_ttl_secs = config.policy.max_ttl.as_secs(),
        burn_workers = config.burn_queue.max_workers,
        "Lifecycle manager initialized"
    );

    state
}
