//! CLI entry point for rangedl.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rangedl_core::download::NoProgress;
use rangedl_core::{DownloadEngine, DownloadOptions};
use tracing::{debug, info, warn};

mod cli;
mod config;
mod progress_ui;

use cli::Args;
use config::{FileConfig, load_config};
use progress_ui::spawn_progress_ui;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = load_config(args.config.as_deref())?.unwrap_or_default();
    let options = build_options(&args, &file_config);
    debug!(?options, "download options resolved");

    let engine = DownloadEngine::connect(&args.url, options, NoProgress)
        .await
        .with_context(|| format!("Cannot start download of {}", args.url))?;

    let task = engine.task();
    info!(
        file = %task.filename,
        size = task.total_size,
        ranges = task.supports_ranges,
        workers = task.worker_count,
        "starting download"
    );

    let control = engine.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling download (part files are kept)");
            control.cancel();
        }
    });

    let show_bars = !args.quiet && io::stderr().is_terminal();
    let (ui_handle, ui_stop) = spawn_progress_ui(show_bars, engine.progress(), task.filename);

    let result = engine.start().await;

    ui_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = ui_handle {
        let _ = handle.await;
    }

    let report = result.with_context(|| format!("Download of {} failed", args.url))?;
    for line in &report.diagnostics {
        debug!(%line, "diagnostic");
    }
    info!(
        path = %report.path.display(),
        bytes = report.bytes,
        workers = report.workers,
        verified = report.size_verified,
        fallback = report.fallback_used,
        "download complete"
    );

    Ok(())
}

/// Merges CLI flags over config file values over library defaults.
fn build_options(args: &Args, file: &FileConfig) -> DownloadOptions {
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut options = DownloadOptions::new(output_dir);
    if let Some(workers) = args.workers.or(file.max_workers) {
        options.max_workers = usize::from(workers);
    }
    if let Some(attempts) = args.max_attempts.or(file.max_attempts) {
        options.max_attempts = attempts;
    }
    if let Some(delay_ms) = args.retry_delay_ms.or(file.retry_delay_ms) {
        options.retry_delay = Duration::from_millis(delay_ms);
    }
    if let Some(secs) = file.connect_timeout_secs {
        options.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.read_timeout_secs {
        options.read_timeout = Duration::from_secs(secs);
    }
    options
}
