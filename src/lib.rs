//! rangedl core library
//!
//! Concurrent, resumable HTTP(S) downloads: a resource is probed for its
//! size and byte-range support, split into ranges fetched in parallel into
//! part files, merged in order and verified against the probed size.
//!
//! # Architecture
//!
//! - [`download`] - probe, planner, workers, pause gate, merge, engine
//!
//! The `rangedl` binary wraps the engine with argument parsing, a config
//! file and terminal progress bars.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub(crate) mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use download::{
    DownloadControl, DownloadEngine, DownloadError, DownloadOptions, DownloadReport,
    DownloadState, DownloadTask, HttpClient, ProgressBoard, ProgressSample, ProgressSink,
    RetryPolicy,
};
pub use user_agent::BROWSER_USER_AGENT;
