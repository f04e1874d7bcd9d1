//! ReelVault CLI - command-line driver for the media vault.
//!
//! Every command prints a single JSON document on stdout. Logs go to stderr.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reelvault_core::{FfmpegThumbnailer, FfprobeProbe, MediaVault};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reelvault")]
#[command(about = "Import, cache and upload short portrait videos")]
struct Args {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Vault data directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// ffprobe binary used for deep validation
    #[arg(long, global = true, default_value = "ffprobe")]
    ffprobe: PathBuf,

    /// ffmpeg binary used for thumbnails
    #[arg(long, global = true, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import one or more video files
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// MIME type to declare instead of guessing from the extension
        #[arg(long)]
        mime_type: Option<String>,
    },
    /// Upload a persisted asset. Ctrl-C cancels the transfer.
    Upload { asset_id: String },
    /// List assets
    List,
    /// Show one asset
    Show { asset_id: String },
    /// Delete an asset and its cached files
    Delete { asset_id: String },
    /// Show cache usage
    Stats,
    /// Check the cache index against the files on disk
    Verify,
    /// Run cache eviction now
    Evict,
    /// Add a sample file to the cache as a demo asset
    Demo { path: PathBuf },
}

fn init_logging(debug: bool) {
    let default_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_local_dir()
        .map(|dir| dir.join("reelvault"))
        .context("Could not determine a data directory; pass --data-dir")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let data_dir = match args.data_dir {
        Some(path) => path,
        None => default_data_dir()?,
    };
    debug!("Vault data directory: {}", data_dir.display());

    let vault = MediaVault::builder(&data_dir)
        .auto_create_dirs(true)
        .with_probe(Arc::new(FfprobeProbe::new(args.ffprobe)))
        .with_thumbnailer(Arc::new(FfmpegThumbnailer::new(args.ffmpeg)))
        .build()
        .await
        .with_context(|| format!("Failed to open vault at {}", data_dir.display()))?;

    let output = commands::run(&vault, args.command).await;
    let failed = output["success"] == false;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
