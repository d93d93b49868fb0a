//! Helpers shared by the `dropvault` binary: tracing, store wiring and file I/O.

use anyhow::{Context, Result};
use dropvault_core::{validate_upload_size, Config, FileRecord, UploadRequest};
use dropvault_db::{setup_database, SqliteFileRepository};
use dropvault_services::FileLifecycleManager;
use dropvault_storage::{create_storage, BlobStream};
use dropvault_worker::BurnQueueConfig;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Initialize tracing for CLI binaries. Logs go to stderr so stdout stays JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

/// Open the configured metadata and blob stores and start a lifecycle manager on them.
pub async fn open_manager(config: &Config) -> Result<Arc<FileLifecycleManager>> {
    let pool = setup_database(&config.database)
        .await
        .context("Failed to open metadata database")?;
    let storage = create_storage(&config.storage)
        .await
        .context("Failed to open blob storage")?;

    Ok(
        FileLifecycleManager::builder(Arc::new(SqliteFileRepository::new(pool)), storage)
            .policy(config.policy)
            .burn_queue(BurnQueueConfig::from(&config.burn_queue))
            .build(),
    )
}

/// Options for [`upload_path`].
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub owner_id: String,
    pub one_time: bool,
    pub ttl_seconds: Option<u64>,
    pub content_type: Option<String>,
    pub max_bytes: u64,
}

/// Validate and upload a local file. The display name is the file name of `path`.
pub async fn upload_path(
    manager: &FileLifecycleManager,
    path: &Path,
    options: UploadOptions,
) -> Result<FileRecord> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let size = file
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    validate_upload_size(size, options.max_bytes)?;

    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());

    let new_file = UploadRequest {
        display_name,
        content_type: options
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        owner_id: options.owner_id,
        one_time: options.one_time,
        ttl_seconds: options.ttl_seconds,
    }
    .into_new_file()?;

    let record = manager.upload(Box::pin(file), new_file).await?;
    Ok(record)
}

/// Drain a blob stream into `writer`, returning the number of bytes written.
pub async fn write_stream<W>(mut stream: BlobStream, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read blob")?;
        writer
            .write_all(&chunk)
            .await
            .context("Failed to write output")?;
        written += chunk.len() as u64;
    }
    writer.flush().await.context("Failed to flush output")?;
    Ok(written)
}
