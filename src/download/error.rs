//! Error types for the download module.
//!
//! Every failure the engine can surface is a [`DownloadError`] variant carrying
//! the URL or path it concerns, so the caller can map it to a human-readable
//! terminal state without extra bookkeeping.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while probing, fetching, merging or verifying.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection reset, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// A connect or read timed out.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server explicitly denied access to the resource.
    ///
    /// Kept apart from [`DownloadError::HttpStatus`] so logs read clearly;
    /// retried like any other transient failure.
    #[error("server blocked download of {url} (HTTP {status} access denied)")]
    AccessBlocked {
        /// The URL that was denied.
        url: String,
        /// The denial status code.
        status: u16,
    },

    /// A ranged request was answered with the full body.
    #[error("server ignored range {range} for {url} (HTTP {status})")]
    RangeIgnored {
        /// The URL requested.
        url: String,
        /// The `Range` header value that was sent.
        range: String,
        /// The status the server answered with.
        status: u16,
    },

    /// File system error (create, write, rename, etc.)
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or not HTTP(S).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// A worker never completed its range.
    #[error("worker {worker} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Index of the range that failed.
        worker: usize,
        /// Attempts made, including the first.
        attempts: u32,
        /// The last recorded failure.
        #[source]
        source: Box<DownloadError>,
    },

    /// A part file expected by the merge is missing.
    #[error("missing part file {path}, merge aborted")]
    PartMissing {
        /// The expected part path.
        path: PathBuf,
    },

    /// Final file size does not match the probed size.
    #[error("size mismatch for {path}: expected {expected_bytes} bytes, got {actual_bytes}")]
    SizeMismatch {
        /// The file that failed verification.
        path: PathBuf,
        /// Probed size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },

    /// The download was cancelled through its control handle.
    #[error("download of {url} cancelled")]
    Cancelled {
        /// The URL being downloaded.
        url: String,
    },

    /// A worker task panicked or was aborted by the runtime.
    #[error("worker {worker} stopped unexpectedly: {message}")]
    WorkerPanicked {
        /// Index of the range whose task died.
        worker: usize,
        /// Join error text.
        message: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::Timeout { url: url.into() };
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an access-denied error.
    pub fn access_blocked(url: impl Into<String>, status: u16) -> Self {
        Self::AccessBlocked {
            url: url.into(),
            status,
        }
    }

    /// Creates a range-ignored error.
    pub fn range_ignored(url: impl Into<String>, range: impl Into<String>, status: u16) -> Self {
        Self::RangeIgnored {
            url: url.into(),
            range: range.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Wraps the last failure of a worker that ran out of attempts.
    pub fn retry_exhausted(worker: usize, attempts: u32, source: DownloadError) -> Self {
        Self::RetryExhausted {
            worker,
            attempts,
            source: Box::new(source),
        }
    }

    /// Creates a missing-part error.
    pub fn part_missing(path: impl Into<PathBuf>) -> Self {
        Self::PartMissing { path: path.into() }
    }

    /// Creates a size mismatch error.
    pub fn size_mismatch(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::SizeMismatch {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates an error for a worker task that did not return.
    pub fn worker_panicked(worker: usize, message: impl Into<String>) -> Self {
        Self::WorkerPanicked {
            worker,
            message: message.into(),
        }
    }

    /// Returns true for the cancellation variant.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path the source error does not carry.
