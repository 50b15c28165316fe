//! Concurrent ranged HTTP downloads.
//!
//! A download is split into contiguous byte ranges that are fetched in
//! parallel into part files and then concatenated. The pieces:
//!
//! - [`probe`](probe::probe) learns the size and whether `Range` works
//! - [`plan_workers`] / [`plan_ranges`] choose the worker count and ranges
//! - a worker per range fetches into `<name>.part<i>`, resuming from the
//!   part's length and retrying with a fixed delay
//! - [`PauseGate`] lets every worker be paused, resumed or cancelled
//! - [`ProgressSink`] receives per-worker speed and percent samples
//! - [`Merger`] concatenates the parts into the final file
//! - [`DownloadEngine`] drives it all and falls back to a single stream
//!
//! # Example
//!
//! ```no_run
//! use rangedl_core::download::{DownloadEngine, DownloadOptions, NoProgress};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::connect(
//!     "https://example.com/archive.tar.gz",
//!     DownloadOptions::new("./downloads").with_max_workers(4),
//!     NoProgress,
//! )
//! .await?;
//! let report = engine.start().await?;
//! println!("{} bytes in {}", report.bytes, report.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod diagnostics;
mod engine;
mod error;
pub mod filename;
mod gate;
mod merge;
pub mod planner;
pub mod probe;
mod progress;
mod retry;
mod single;
mod worker;

pub use client::HttpClient;
pub use diagnostics::DiagnosticLog;
pub use engine::{
    DownloadControl, DownloadEngine, DownloadOptions, DownloadReport, DownloadState, DownloadTask,
};
pub use error::DownloadError;
pub use gate::{Checkpoint, GateState, PauseGate};
pub use merge::{MergeOutcome, Merger};
pub use planner::{ChunkRange, plan_ranges, plan_workers};
pub use probe::ProbeResult;
pub use progress::{
    NoProgress, ProgressBoard, ProgressSample, ProgressSink, overall_percent,
};
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
pub use single::StreamOutcome;
pub use worker::ChunkOutcome;

// Note: no module-local Result alias; signatures spell out
// `Result<T, DownloadError>`.
