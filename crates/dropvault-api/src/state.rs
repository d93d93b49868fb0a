//! Application state shared by all handlers.

use dropvault_core::Config;
use dropvault_services::FileLifecycleManager;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

pub struct AppState {
    pub config: Config,
    pub files: Arc<FileLifecycleManager>,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    pub fn new(config: Config, files: Arc<FileLifecycleManager>) -> Self {
        Self {
            config,
            files,
            sweep_handle: Mutex::new(None),
        }
    }

    pub fn set_sweep_handle(&self, handle: JoinHandle<()>) {
        *self.sweep_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Stop the sweep loop and drain pending burns.
    pub async fn shutdown(&self) {
        let handle = self
            .sweep_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.files.shutdown().await;
    }
}
