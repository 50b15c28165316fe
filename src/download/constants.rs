//! Constants for the download module (timeouts, retries, sampling).

use std::time::Duration;

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default HTTP read timeout between body chunks (30 seconds).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Default maximum attempts per range, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default fixed delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Default caller-requested upper bound on workers.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Minimum time between two progress samples from the same worker.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Filename used when the URL has no usable path segment.
pub const FALLBACK_FILENAME: &str = "downloaded_file";

/// Bytes per megabyte used for speed reporting.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
