//! Single-stream transfer without ranges.
//!
//! Used when only one worker is planned and as the corrective fallback when a
//! merged file fails size verification. The body streams into
//! `<name>.temp`, which replaces the final file once complete. Each attempt
//! starts from scratch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Method, Response};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::client::HttpClient;
use super::diagnostics::DiagnosticLog;
use super::error::DownloadError;
use super::filename::{final_path, temp_path};
use super::gate::{Checkpoint, PauseGate};
use super::merge::replace_file;
use super::progress::{ProgressSink, SpeedMeter};
use super::retry::{RetryPolicy, run_with_retry};

/// Progress is reported under this worker index.
const SINGLE_WORKER: usize = 0;

/// Result of a finished single-stream transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    /// The final artifact.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// Attempts used.
    pub attempts: u32,
}

pub(crate) struct SingleStream {
    pub(crate) client: HttpClient,
    pub(crate) url: String,
    pub(crate) dir: PathBuf,
    pub(crate) filename: String,
    /// Probed size; 0 when unknown.
    pub(crate) expected: u64,
    pub(crate) gate: PauseGate,
    pub(crate) sink: Arc<dyn ProgressSink>,
    pub(crate) policy: RetryPolicy,
    pub(crate) progress_interval: Duration,
    pub(crate) log: DiagnosticLog,
}

impl SingleStream {
    #[instrument(skip(self), fields(url = %self.url, filename = %self.filename))]
    pub(crate) async fn run(&self) -> Result<StreamOutcome, DownloadError> {
        let temp = temp_path(&self.dir, &self.filename);
        let result = run_with_retry(
            &self.policy,
            SINGLE_WORKER,
            &self.url,
            &self.gate,
            &self.log,
            |_| self.attempt(&temp),
        )
        .await;

        let (bytes, attempts) = match result {
            Ok(done) => done,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(e);
            }
        };

        let path = final_path(&self.dir, &self.filename);
        if let Err(e) = replace_file(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        let meter = SpeedMeter::new(SINGLE_WORKER, self.expected, bytes, self.progress_interval);
        self.sink.on_progress(meter.finished());
        info!(path = %path.display(), bytes, attempts, "single-stream download complete");

        Ok(StreamOutcome {
            path,
            bytes,
            attempts,
        })
    }

    async fn attempt(&self, temp: &Path) -> Result<u64, DownloadError> {
        let response = self.client.send(Method::GET, &self.url, None).await?;
        let file = File::create(temp)
            .await
            .map_err(|e| DownloadError::io(temp, e))?;
        let mut writer = BufWriter::new(file);

        let mut written = 0u64;
        let streamed = self
            .stream_body(&mut writer, temp, response, &mut written)
            .await;
        let flushed = writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(temp, e));
        streamed?;
        flushed?;
        debug!(written, "body streamed");
        Ok(written)
    }

    async fn stream_body(
        &self,
        writer: &mut BufWriter<File>,
        temp: &Path,
        response: Response,
        written: &mut u64,
    ) -> Result<(), DownloadError> {
        let mut meter = SpeedMeter::new(SINGLE_WORKER, self.expected, 0, self.progress_interval);
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::network(&self.url, e))?;

            if self.gate.checkpoint().await == Checkpoint::Cancelled {
                return Err(DownloadError::cancelled(&self.url));
            }

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(temp, e))?;
            *written += chunk.len() as u64;

            if let Some(sample) = meter.observe(*written) {
                self.sink.on_progress(sample);
            }
        }
        Ok(())
    }
}
