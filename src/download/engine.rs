//! Download orchestrator: probe, plan, fetch ranges, merge, verify.
//!
//! A [`DownloadEngine`] owns one download. [`DownloadEngine::connect`] probes
//! the server and plans the ranges eagerly; [`DownloadEngine::start`] runs the
//! rest of the pipeline:
//!
//! ```text
//! Probing -> Planning -> Downloading -> Merging -> Verifying -> Completed
//!                             |            |           |
//!                             +------------+-----------+-----> Failed
//! ```
//!
//! With a single planned worker the part/merge stages are skipped and the
//! body is streamed directly. When a merged file does not have the probed
//! size, the whole transfer is repeated once as a single stream and that
//! outcome becomes the result.
//!
//! # Example
//!
//! ```no_run
//! use rangedl_core::download::{DownloadEngine, DownloadOptions, ProgressSample};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = DownloadOptions::new("./downloads");
//! let engine = DownloadEngine::connect(
//!     "https://example.com/debian.iso",
//!     options,
//!     |sample: ProgressSample| println!("worker {}: {:.1}%", sample.worker_index, sample.percent),
//! )
//! .await?;
//! let report = engine.start().await?;
//! println!("saved {} ({} bytes)", report.path.display(), report.bytes);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::HttpClient;
use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_WORKERS, DEFAULT_RETRY_DELAY,
    PROGRESS_INTERVAL, READ_TIMEOUT_SECS,
};
use super::diagnostics::DiagnosticLog;
use super::error::DownloadError;
use super::filename::{final_path, part_path};
use super::gate::PauseGate;
use super::merge::Merger;
use super::planner::{ChunkRange, host_cores, plan_ranges, plan_workers};
use super::probe::probe;
use super::progress::{BoardSink, ProgressBoard, ProgressSink};
use super::retry::RetryPolicy;
use super::single::SingleStream;
use super::worker::{ChunkOutcome, ChunkWorker};

/// Caller-tunable settings of one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Directory receiving the final file and its temporaries.
    pub output_dir: PathBuf,
    /// Upper bound on concurrent range workers.
    pub max_workers: usize,
    /// Attempts per range (or per single-stream transfer), including the first.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Per-connection connect timeout.
    pub connect_timeout: Duration,
    /// Per-read timeout while streaming a body.
    pub read_timeout: Duration,
    /// Minimum time between two progress samples of one worker.
    pub progress_interval: Duration,
}

impl DownloadOptions {
    /// Default options writing into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_workers: DEFAULT_MAX_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Sets the worker bound.
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Sets the attempt cap and delay.
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.retry_delay = retry_delay;
        self
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_delay)
    }
}

/// Lifecycle of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    /// Asking the server for size and range support.
    Probing,
    /// Choosing the worker count and ranges.
    Planning,
    /// Workers are transferring bytes.
    Downloading,
    /// Part files are being concatenated.
    Merging,
    /// The final size is being checked.
    Verifying,
    /// The final file is in place.
    Completed,
    /// The download stopped with an error.
    Failed,
}

/// Snapshot of what the engine knows about its download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Source URL.
    pub url: String,
    /// Destination directory.
    pub output_dir: PathBuf,
    /// Sanitized output filename.
    pub filename: String,
    /// Probed size in bytes; 0 when unknown.
    pub total_size: u64,
    /// Whether the server honours byte ranges.
    pub supports_ranges: bool,
    /// True when probing failed and defaults were used.
    pub degraded: bool,
    /// Planned worker count.
    pub worker_count: usize,
    /// Planned ranges; empty when the size is unknown.
    pub ranges: Vec<ChunkRange>,
    /// `[LEVEL] message` lines recorded so far.
    pub diagnostics: Vec<String>,
}

impl DownloadTask {
    /// Path of the final artifact.
    #[must_use]
    pub fn final_path(&self) -> PathBuf {
        final_path(&self.output_dir, &self.filename)
    }

    /// Paths of the part files for the planned ranges.
    #[must_use]
    pub fn part_paths(&self) -> Vec<PathBuf> {
        self.ranges
            .iter()
            .map(|range| part_path(&self.output_dir, &self.filename, range.index))
            .collect()
    }
}

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    /// The final artifact.
    pub path: PathBuf,
    /// Its size in bytes.
    pub bytes: u64,
    /// Workers that ran.
    pub workers: usize,
    /// True when the size matched a known probed size.
    pub size_verified: bool,
    /// True when the single-stream fallback produced the file.
    pub fallback_used: bool,
    /// Diagnostic lines of the whole run.
    pub diagnostics: Vec<String>,
}

/// Cloneable handle for pausing, resuming or cancelling a running download.
#[derive(Debug, Clone)]
pub struct DownloadControl {
    gate: PauseGate,
}

impl DownloadControl {
    /// Suspends byte writing in every worker.
    pub fn pause(&self) {
        self.gate.pause();
    }

    /// Resumes byte writing.
    pub fn resume(&self) {
        self.gate.resume();
    }

    /// Stops every worker at its next write; `start` returns `Cancelled`.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    /// True while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }
}

/// Probes, plans and runs one concurrent ranged download.
pub struct DownloadEngine {
    client: HttpClient,
    options: DownloadOptions,
    task: DownloadTask,
    gate: PauseGate,
    sink: Arc<dyn ProgressSink>,
    board: ProgressBoard,
    log: DiagnosticLog,
    state: watch::Sender<DownloadState>,
}

impl std::fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("task", &self.task)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Validates `url`, prepares the output directory, probes the server and
    /// plans the ranges.
    ///
    /// Probing never fails the call: an unresponsive server yields an
    /// unknown size and a single worker.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] for unparsable or non-HTTP(S) URLs
    /// - [`DownloadError::Io`] if the output directory cannot be created
    /// - [`DownloadError::Network`] if the HTTP client cannot be built
    #[instrument(skip(options, sink), fields(output_dir = %options.output_dir.display()))]
    pub async fn connect(
        url: &str,
        options: DownloadOptions,
        sink: impl ProgressSink + 'static,
    ) -> Result<Self, DownloadError> {
        let parsed = parse_http_url(url)?;
        tokio::fs::create_dir_all(&options.output_dir)
            .await
            .map_err(|e| DownloadError::io(&options.output_dir, e))?;

        let client = HttpClient::with_timeouts(options.connect_timeout, options.read_timeout)?;
        let (state, _) = watch::channel(DownloadState::Probing);
        let log = DiagnosticLog::new();

        let probed = probe(&client, &parsed, &log).await;
        state.send_replace(DownloadState::Planning);

        let worker_count = plan_workers(
            probed.total_size,
            options.max_workers,
            host_cores(),
            probed.supports_ranges,
        );
        let ranges = plan_ranges(probed.total_size, worker_count);
        log.info(format!(
            "planned {worker_count} worker(s) for {} ({} bytes, ranges {})",
            probed.filename,
            probed.total_size,
            if probed.supports_ranges {
                "supported"
            } else {
                "unsupported"
            }
        ));

        let board = ProgressBoard::new(worker_count);
        let sink: Arc<dyn ProgressSink> =
            Arc::new(BoardSink::new(board.clone(), Arc::new(sink)));

        let task = DownloadTask {
            url: parsed.to_string(),
            output_dir: options.output_dir.clone(),
            filename: probed.filename,
            total_size: probed.total_size,
            supports_ranges: probed.supports_ranges,
            degraded: probed.degraded,
            worker_count,
            ranges,
            diagnostics: Vec::new(),
        };

        Ok(Self {
            client,
            options,
            task,
            gate: PauseGate::new(),
            sink,
            board,
            log,
            state,
        })
    }

    /// Runs the download to completion.
    ///
    /// Every worker runs to its own end; a failing worker never stops the
    /// others. Parts are left on disk when the download fails, so a later
    /// `start` resumes them.
    ///
    /// # Errors
    ///
    /// - the failure of the lowest-index failed worker
    ///   ([`DownloadError::RetryExhausted`], [`DownloadError::RangeIgnored`],
    ///   [`DownloadError::WorkerPanicked`], ...)
    /// - [`DownloadError::PartMissing`] or [`DownloadError::Io`] from the merge
    /// - [`DownloadError::Cancelled`] after [`cancel`](Self::cancel)
    #[instrument(skip(self), fields(url = %self.task.url, workers = self.task.worker_count))]
    pub async fn start(&self) -> Result<DownloadReport, DownloadError> {
        if self.gate.is_cancelled() {
            return Err(self.fail(DownloadError::cancelled(&self.task.url)));
        }
        self.set_state(DownloadState::Downloading);

        if self.task.worker_count <= 1 || self.task.ranges.len() <= 1 {
            return self.run_single_stream(false).await;
        }

        let outcomes = match self.run_workers().await {
            Ok(outcomes) => outcomes,
            Err(e) => return Err(self.fail(e)),
        };
        let resumed: u64 = outcomes.iter().map(|o| o.resumed_from).sum();
        if resumed > 0 {
            info!(resumed, "reused bytes from existing part files");
        }

        self.set_state(DownloadState::Merging);
        let merged = Merger::new(&self.task.output_dir, &self.task.filename, outcomes.len())
            .merge()
            .await
            .map_err(|e| self.fail(e))?;

        self.set_state(DownloadState::Verifying);
        let actual = tokio::fs::metadata(&merged.path)
            .await
            .map_err(|e| self.fail(DownloadError::io(&merged.path, e)))?
            .len();

        if self.task.total_size == 0 {
            debug!("size unknown, accepting merged file");
        } else if actual != self.task.total_size {
            let mismatch =
                DownloadError::size_mismatch(&merged.path, self.task.total_size, actual);
            self.log
                .warn(format!("{mismatch}, repeating as a single stream"));
            self.board.restart(1);
            return self.run_single_stream(true).await;
        }

        self.set_state(DownloadState::Completed);
        info!(path = %merged.path.display(), bytes = actual, "download completed");
        Ok(DownloadReport {
            path: merged.path,
            bytes: actual,
            workers: outcomes.len(),
            size_verified: self.task.total_size > 0,
            fallback_used: false,
            diagnostics: self.log.lines(),
        })
    }

    /// Spawns one task per range and waits for all of them.
    async fn run_workers(&self) -> Result<Vec<ChunkOutcome>, DownloadError> {
        let handles: Vec<_> = self
            .task
            .ranges
            .iter()
            .map(|range| {
                let worker = ChunkWorker {
                    client: self.client.clone(),
                    url: self.task.url.clone(),
                    range: *range,
                    part: part_path(&self.task.output_dir, &self.task.filename, range.index),
                    gate: self.gate.clone(),
                    sink: Arc::clone(&self.sink),
                    policy: self.options.retry_policy(),
                    progress_interval: self.options.progress_interval,
                    log: self.log.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        debug!(task_count = handles.len(), "waiting for workers");

        let mut outcomes = Vec::with_capacity(handles.len());
        let mut first_failure = None;
        for (index, handle) in handles.into_iter().enumerate() {
            let result = handle.await.unwrap_or_else(|e| {
                warn!(worker = index, error = %e, "worker task panicked");
                Err(DownloadError::worker_panicked(index, e.to_string()))
            });
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    } else {
                        debug!(worker = index, error = %e, "additional worker failure");
                    }
                }
            }
        }

        if self.gate.is_cancelled() {
            return Err(DownloadError::cancelled(&self.task.url));
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    }

    /// Streams the whole body without ranges into the output directory.
    async fn run_single_stream(&self, fallback: bool) -> Result<DownloadReport, DownloadError> {
        if fallback {
            self.set_state(DownloadState::Downloading);
        }
        let single = SingleStream {
            client: self.client.clone(),
            url: self.task.url.clone(),
            dir: self.task.output_dir.clone(),
            filename: self.task.filename.clone(),
            expected: self.task.total_size,
            gate: self.gate.clone(),
            sink: Arc::clone(&self.sink),
            policy: self.options.retry_policy(),
            progress_interval: self.options.progress_interval,
            log: self.log.clone(),
        };
        let outcome = single.run().await.map_err(|e| self.fail(e))?;

        self.set_state(DownloadState::Verifying);
        let size_verified = self.task.total_size > 0 && outcome.bytes == self.task.total_size;
        if self.task.total_size > 0 && !size_verified {
            self.log.warn(format!(
                "single-stream download wrote {} bytes, server announced {}",
                outcome.bytes, self.task.total_size
            ));
        }

        self.set_state(DownloadState::Completed);
        info!(path = %outcome.path.display(), bytes = outcome.bytes, fallback, "download completed");
        Ok(DownloadReport {
            path: outcome.path,
            bytes: outcome.bytes,
            workers: 1,
            size_verified,
            fallback_used: fallback,
            diagnostics: self.log.lines(),
        })
    }

    fn set_state(&self, next: DownloadState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "state transition");
        }
    }

    fn fail(&self, error: DownloadError) -> DownloadError {
        if error.is_cancelled() {
            self.log.warn("download cancelled");
        } else {
            self.log.error(format!("download failed: {error}"));
        }
        self.set_state(DownloadState::Failed);
        error
    }

    /// Suspends byte writing in every worker.
    pub fn pause(&self) {
        self.gate.pause();
    }

    /// Resumes byte writing.
    pub fn resume(&self) {
        self.gate.resume();
    }

    /// Stops the download at the next write of every worker.
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    /// Handle usable from other tasks while [`start`](Self::start) runs.
    #[must_use]
    pub fn control(&self) -> DownloadControl {
        DownloadControl {
            gate: self.gate.clone(),
        }
    }

    /// Snapshot of the task, including diagnostics recorded so far.
    #[must_use]
    pub fn task(&self) -> DownloadTask {
        DownloadTask {
            diagnostics: self.log.lines(),
            ..self.task.clone()
        }
    }

    /// Live per-worker progress, shared with the running workers.
    #[must_use]
    pub fn progress(&self) -> ProgressBoard {
        self.board.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DownloadState {
        *self.state.borrow()
    }

    /// Receiver notified on every state transition.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<DownloadState> {
        self.state.subscribe()
    }
}

fn parse_http_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(DownloadError::invalid_url(url));
    }
    Ok(parsed)
}
