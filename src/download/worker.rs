//! One worker per byte range: fetch the range into its part file.
//!
//! The part file's length is the resume checkpoint. Every attempt re-reads
//! it and asks only for the missing tail, so bytes already on disk are never
//! requested or written again.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Response;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};

use super::client::HttpClient;
use super::diagnostics::DiagnosticLog;
use super::error::DownloadError;
use super::gate::{Checkpoint, PauseGate};
use super::planner::ChunkRange;
use super::progress::{ProgressSink, SpeedMeter};
use super::retry::{RetryPolicy, run_with_retry};

/// Result of a range that finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Range index.
    pub index: usize,
    /// Length of the part file when the worker returned.
    pub bytes: u64,
    /// Bytes already on disk before the first attempt.
    pub resumed_from: u64,
    /// Attempts used, including the first.
    pub attempts: u32,
}

/// Everything one worker needs; moved into its task.
pub(crate) struct ChunkWorker {
    pub(crate) client: HttpClient,
    pub(crate) url: String,
    pub(crate) range: ChunkRange,
    pub(crate) part: PathBuf,
    pub(crate) gate: PauseGate,
    pub(crate) sink: Arc<dyn ProgressSink>,
    pub(crate) policy: RetryPolicy,
    pub(crate) progress_interval: Duration,
    pub(crate) log: DiagnosticLog,
}

impl ChunkWorker {
    /// Materializes the range into its part file.
    ///
    /// Failures are returned, never raised across the task boundary.
    #[instrument(skip(self), fields(worker = self.range.index, start = self.range.start, end = self.range.end))]
    pub(crate) async fn run(self) -> Result<ChunkOutcome, DownloadError> {
        let expected = self.range.len();
        let resumed_from = self.checkpoint_len(expected).await?;
        if resumed_from > 0 {
            debug!(resumed_from, expected, "resuming from part file");
        }

        let (bytes, attempts) = run_with_retry(
            &self.policy,
            self.range.index,
            &self.url,
            &self.gate,
            &self.log,
            |_| self.fetch_remaining(expected),
        )
        .await?;

        if bytes < expected {
            self.log.warn(format!(
                "worker {}: server delivered {bytes} of {expected} bytes, range clipped",
                self.range.index
            ));
        }
        let meter = SpeedMeter::new(self.range.index, expected, bytes, self.progress_interval);
        self.sink.on_progress(meter.finished());
        debug!(bytes, attempts, "range complete");

        Ok(ChunkOutcome {
            index: self.range.index,
            bytes,
            resumed_from,
            attempts,
        })
    }

    /// One attempt: request the missing tail and append it.
    async fn fetch_remaining(&self, expected: u64) -> Result<u64, DownloadError> {
        let mut have = self.checkpoint_len(expected).await?;
        if have >= expected {
            return Ok(have);
        }

        let response = self
            .client
            .get_range(&self.url, self.range.start + have, self.range.end)
            .await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.part)
            .await
            .map_err(|e| DownloadError::io(&self.part, e))?;
        let mut writer = BufWriter::new(file);

        let streamed = self
            .append_body(&mut writer, response, &mut have, expected)
            .await;
        let flushed = writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(&self.part, e));
        streamed?;
        flushed?;
        Ok(have)
    }

    async fn append_body(
        &self,
        writer: &mut BufWriter<File>,
        response: Response,
        have: &mut u64,
        expected: u64,
    ) -> Result<(), DownloadError> {
        let mut meter = SpeedMeter::new(self.range.index, expected, *have, self.progress_interval);
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::network(&self.url, e))?;

            if self.gate.checkpoint().await == Checkpoint::Cancelled {
                return Err(DownloadError::cancelled(&self.url));
            }

            let room = expected - *have;
            let take = usize::try_from(room).map_or(chunk.len(), |room| room.min(chunk.len()));
            writer
                .write_all(&chunk[..take])
                .await
                .map_err(|e| DownloadError::io(&self.part, e))?;
            *have += take as u64;

            if let Some(sample) = meter.observe(*have) {
                self.sink.on_progress(sample);
            }
            if *have >= expected {
                if take < chunk.len() {
                    warn!(extra = chunk.len() - take, "server sent bytes past range end, discarded");
                }
                break;
            }
        }
        Ok(())
    }

    /// Current part length; an oversized part is discarded.
    async fn checkpoint_len(&self, expected: u64) -> Result<u64, DownloadError> {
        let len = match tokio::fs::metadata(&self.part).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(DownloadError::io(&self.part, e)),
        };
        if len > expected {
            self.log.warn(format!(
                "worker {}: part file holds {len} bytes for a {expected}-byte range, refetching",
                self.range.index
            ));
            tokio::fs::remove_file(&self.part)
                .await
                .map_err(|e| DownloadError::io(&self.part, e))?;
            return Ok(0);
        }
        Ok(len)
    }
}
