//! Progress reporting contract between workers and the caller.
//!
//! Workers emit [`ProgressSample`]s through a [`ProgressSink`]. Samples from
//! different workers arrive concurrently and in no particular order; a sink
//! must not block. The engine also mirrors every sample into a
//! [`ProgressBoard`], a fixed slot per worker, so callers can poll a snapshot
//! instead of aggregating themselves.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::constants::BYTES_PER_MB;

/// One progress observation from one worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Index of the reporting worker (0 for single-stream transfers).
    pub worker_index: usize,
    /// Recent transfer speed in MB/s.
    pub speed_mbps: f64,
    /// Completion of the worker's range, 0.0..=100.0.
    pub percent: f64,
}

/// Receiver of progress samples, invoked from worker tasks.
pub trait ProgressSink: Send + Sync {
    /// Called repeatedly and concurrently; must return quickly.
    fn on_progress(&self, sample: ProgressSample);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressSample) + Send + Sync,
{
    fn on_progress(&self, sample: ProgressSample) {
        self(sample);
    }
}

/// Sink that discards every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _sample: ProgressSample) {}
}

/// Per-worker progress slots allocated at planning time.
///
/// Each slot is written only by the worker that owns its index, so plain
/// atomics suffice. When the engine falls back to a single stream, the board
/// is narrowed to its first slot and only that slot is reported.
#[derive(Debug, Clone)]
pub struct ProgressBoard {
    slots: Arc<[WorkerSlot]>,
    active: Arc<AtomicUsize>,
}

#[derive(Debug, Default)]
struct WorkerSlot {
    percent_bits: AtomicU64,
    speed_bits: AtomicU64,
}

impl ProgressBoard {
    /// Creates a board with `workers` zeroed slots.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let slots: Vec<WorkerSlot> = (0..workers).map(|_| WorkerSlot::default()).collect();
        Self {
            slots: slots.into(),
            active: Arc::new(AtomicUsize::new(workers)),
        }
    }

    /// Zeroes every slot and keeps only the first `workers` in use.
    pub(crate) fn restart(&self, workers: usize) {
        self.active.store(0, Ordering::Relaxed);
        for slot in self.slots.iter() {
            slot.percent_bits.store(0, Ordering::Relaxed);
            slot.speed_bits.store(0, Ordering::Relaxed);
        }
        self.active
            .store(workers.min(self.slots.len()), Ordering::Relaxed);
    }

    /// Stores a sample in its worker's slot. Indices outside the slots in
    /// use are ignored.
    pub fn record(&self, sample: ProgressSample) {
        if sample.worker_index >= self.active.load(Ordering::Relaxed) {
            return;
        }
        if let Some(slot) = self.slots.get(sample.worker_index) {
            slot.percent_bits
                .store(sample.percent.to_bits(), Ordering::Relaxed);
            slot.speed_bits
                .store(sample.speed_mbps.to_bits(), Ordering::Relaxed);
        }
    }

    /// Number of slots allocated at planning time.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the board has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// `(percent, speed_mbps)` per slot in use, in index order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(f64, f64)> {
        self.slots
            .iter()
            .take(self.active.load(Ordering::Relaxed))
            .map(|slot| {
                (
                    f64::from_bits(slot.percent_bits.load(Ordering::Relaxed)),
                    f64::from_bits(slot.speed_bits.load(Ordering::Relaxed)),
                )
            })
            .collect()
    }

    /// Mean of the per-worker percentages.
    #[must_use]
    pub fn overall_percent(&self) -> f64 {
        overall_percent(&self.snapshot())
    }

    /// Sum of the per-worker speeds in MB/s.
    #[must_use]
    pub fn total_speed_mbps(&self) -> f64 {
        self.snapshot().iter().map(|(_, speed)| speed).sum()
    }
}

/// Mean percent over `(percent, speed)` pairs; 0 for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn overall_percent(slots: &[(f64, f64)]) -> f64 {
    if slots.is_empty() {
        return 0.0;
    }
    slots.iter().map(|(percent, _)| percent).sum::<f64>() / slots.len() as f64
}

/// Sink decorator that records into a board before forwarding.
pub(crate) struct BoardSink {
    board: ProgressBoard,
    inner: Arc<dyn ProgressSink>,
}

impl BoardSink {
    pub(crate) fn new(board: ProgressBoard, inner: Arc<dyn ProgressSink>) -> Self {
        Self { board, inner }
    }
}

impl ProgressSink for BoardSink {
    fn on_progress(&self, sample: ProgressSample) {
        self.board.record(sample);
        self.inner.on_progress(sample);
    }
}

/// Speed sampler for one worker.
///
/// [`SpeedMeter::observe`] returns a sample only once more than `interval`
/// has elapsed since the previous one.
#[derive(Debug)]
pub(crate) struct SpeedMeter {
    worker_index: usize,
    expected: u64,
    interval: Duration,
    last_instant: Instant,
    last_bytes: u64,
}

impl SpeedMeter {
    /// `expected` is the range length (0 when unknown); `done` the bytes
    /// already present when the meter starts.
    pub(crate) fn new(worker_index: usize, expected: u64, done: u64, interval: Duration) -> Self {
        Self {
            worker_index,
            expected,
            interval,
            last_instant: Instant::now(),
            last_bytes: done,
        }
    }

    pub(crate) fn observe(&mut self, done: u64) -> Option<ProgressSample> {
        self.observe_at(done, Instant::now())
    }

    #[allow(clippy::cast_precision_loss)]
    fn observe_at(&mut self, done: u64, now: Instant) -> Option<ProgressSample> {
        let elapsed = now.saturating_duration_since(self.last_instant);
        if elapsed <= self.interval {
            return None;
        }
        let delta = done.saturating_sub(self.last_bytes) as f64;
        let speed_mbps = delta / elapsed.as_secs_f64() / BYTES_PER_MB;
        self.last_instant = now;
        self.last_bytes = done;
        Some(ProgressSample {
            worker_index: self.worker_index,
            speed_mbps,
            percent: self.percent(done),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn percent(&self, done: u64) -> f64 {
        if self.expected == 0 {
            return 0.0;
        }
        (done as f64 / self.expected as f64 * 100.0).min(100.0)
    }

    /// The final 100% sample.
    pub(crate) fn finished(&self) -> ProgressSample {
        ProgressSample {
            worker_index: self.worker_index,
            speed_mbps: 0.0,
            percent: 100.0,
        }
    }
}
