//! Fixed-delay retry policy for range and single-stream transfers.
//!
//! When a transfer attempt fails, the error is classified into a
//! [`FailureType`] and the [`RetryPolicy`] decides whether another attempt is
//! made. Delays are constant: there is no exponential backoff and no jitter.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use rangedl_core::download::{DownloadError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(100));
//! let error = DownloadError::http_status("https://example.com/file.iso", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => assert_eq!((delay.as_millis(), attempt), (100, 2)),
//!     RetryDecision::DoNotRetry { reason } => panic!("unexpected: {reason}"),
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, instrument};

use super::DownloadError;
use super::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use super::diagnostics::DiagnosticLog;
use super::gate::PauseGate;

/// Classification of transfer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on another attempt: timeouts, resets, error statuses,
    /// access denials, local write errors.
    Transient,

    /// Will not succeed regardless of retries.
    ///
    /// Examples: invalid URL, a server that ignores `Range`.
    Permanent,

    /// The caller cancelled the download.
    Cancelled,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Fixed-delay retry configuration.
///
/// # Default Values
///
/// - `max_attempts`: 10
/// - `delay`: 2 seconds
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Delay between two attempts.
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the fixed delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Cancelled => {
                return RetryDecision::DoNotRetry {
                    reason: "download cancelled".to_string(),
                };
            }
            FailureType::Transient => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Classifies a download error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Network, Timeout, HttpStatus, AccessBlocked, Io | Transient |
/// | InvalidUrl, RangeIgnored | Permanent |
/// | Cancelled | Cancelled |
///
/// Aggregate errors (`RetryExhausted`, `PartMissing`, `SizeMismatch`,
/// `WorkerPanicked`) never reach a retry loop and are reported as permanent.
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::Network { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::HttpStatus { .. }
        | DownloadError::AccessBlocked { .. }
        | DownloadError::Io { .. } => FailureType::Transient,

        DownloadError::Cancelled { .. } => FailureType::Cancelled,

        DownloadError::InvalidUrl { .. }
        | DownloadError::RangeIgnored { .. }
        | DownloadError::RetryExhausted { .. }
        | DownloadError::PartMissing { .. }
        | DownloadError::SizeMismatch { .. }
        | DownloadError::WorkerPanicked { .. } => FailureType::Permanent,
    }
}

/// Runs `attempt_fn` until it succeeds or the policy gives up.
///
/// `attempt_fn` receives the 1-indexed attempt number. Returns the value and
/// the attempt that produced it. Transient failures that run out of attempts
/// are wrapped in [`DownloadError::RetryExhausted`]; permanent failures and
/// cancellation are returned as they are. The delay between attempts is cut
/// short by cancellation.
pub(crate) async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    worker: usize,
    url: &str,
    gate: &PauseGate,
    log: &DiagnosticLog,
    mut attempt_fn: F,
) -> Result<(T, u32), DownloadError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
{
    let mut attempt = 1u32;

    loop {
        if gate.is_cancelled() {
            return Err(DownloadError::cancelled(url));
        }
        debug!(worker, attempt, "attempting transfer");

        let error = match attempt_fn(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) => e,
        };
        let failure_type = classify_error(&error);

        match policy.should_retry(failure_type, attempt) {
            RetryDecision::Retry {
                delay,
                attempt: next_attempt,
            } => {
                if let DownloadError::AccessBlocked { status, .. } = &error {
                    log.warn(format!(
                        "worker {worker}: server denied access (HTTP {status}) on attempt {attempt}/{}",
                        policy.max_attempts()
                    ));
                } else {
                    log.warn(format!(
                        "worker {worker}: attempt {attempt}/{} failed: {error}",
                        policy.max_attempts()
                    ));
                }
                info!(
                    worker,
                    attempt = next_attempt,
                    delay_ms = delay.as_millis(),
                    "retrying transfer"
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = gate.cancelled() => return Err(DownloadError::cancelled(url)),
                }
                attempt = next_attempt;
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(worker, %reason, "not retrying transfer");
                return Err(match failure_type {
                    FailureType::Cancelled => error,
                    FailureType::Permanent => {
                        log.error(format!("worker {worker}: {error}"));
                        error
                    }
                    FailureType::Transient => {
                        log.error(format!(
                            "worker {worker}: giving up after {attempt} attempts: {error}"
                        ));
                        DownloadError::retry_exhausted(worker, attempt, error)
                    }
                });
            }
        }
    }
}
