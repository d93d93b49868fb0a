//! Dropvault CLI: runs the file lifecycle against the configured local stores.
//!
//! Reads the same environment as the server (`DATABASE_URL`, `LOCAL_STORAGE_PATH`, ...).

use anyhow::Context;
use clap::{Parser, Subcommand};
use dropvault_cli::{init_tracing, open_manager, upload_path, write_stream, UploadOptions};
use dropvault_core::Config;
use dropvault_services::{FileLifecycleManager, SweepService};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dropvault", about = "Ephemeral file sharing from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and print its record
    Upload {
        /// Path to the file to upload
        path: PathBuf,
        /// Owner id stored with the file
        #[arg(long)]
        owner: String,
        /// Burn the file after its first download
        #[arg(long)]
        one_time: bool,
        /// Requested lifetime in seconds (clamped to MAX_FILE_TTL_SECONDS)
        #[arg(long)]
        ttl_secs: Option<u64>,
        /// Content type recorded for downloads
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download a file. Counts as a download and burns one-time files.
    Download {
        /// File id
        id: String,
        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show a file's metadata without downloading it
    Info {
        /// File id
        id: String,
    },
    /// List an owner's files, newest first
    List {
        #[arg(long)]
        owner: String,
    },
    /// Delete a file now
    Burn {
        /// File id
        id: String,
    },
    /// Run one reconciliation sweep (expired, condemned, orphan blobs)
    Sweep,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn run(
    command: Commands,
    manager: &Arc<FileLifecycleManager>,
    config: &Config,
) -> anyhow::Result<()> {
    match command {
        Commands::Upload {
            path,
            owner,
            one_time,
            ttl_secs,
            content_type,
        } => {
            let options = UploadOptions {
                owner_id: owner,
                one_time,
                ttl_seconds: ttl_secs,
                content_type,
                max_bytes: config.max_file_size_bytes as u64,
            };
            let record = upload_path(manager, &path, options).await?;
            print_json(&record)?;
        }
        Commands::Download { id, output } => {
            let (stream, record) = manager.download(&id).await?;
            match output {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    let written = write_stream(stream, &mut file).await?;
                    print_json(&serde_json::json!({
                        "file": record,
                        "output": path,
                        "bytes_written": written,
                    }))?;
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    write_stream(stream, &mut stdout).await?;
                }
            }
        }
        Commands::Info { id } => {
            let record = manager.get_metadata(&id).await?;
            let expired = manager.is_expired(&record);
            print_json(&serde_json::json!({
                "file": record,
                "expired": expired,
            }))?;
        }
        Commands::List { owner } => {
            let records = manager.list_by_owner(&owner).await?;
            print_json(&records)?;
        }
        Commands::Burn { id } => {
            let report = manager.burn(&id).await?;
            print_json(&serde_json::json!({ "id": id, "burn": report }))?;
        }
        Commands::Sweep => {
            let sweep = SweepService::new(manager.clone(), config.sweep.clone());
            let report = sweep.run_once().await;
            manager.wait_for_pending_burns().await;
            print_json(&report)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let manager = open_manager(&config).await?;

    let result = run(cli.command, &manager, &config).await;

    // Queued burns (one-time downloads, expiry) must land before the process exits.
    manager.shutdown().await;

    result
}
