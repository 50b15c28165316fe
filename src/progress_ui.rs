//! Terminal progress bars for a running download.
//!
//! One bar per worker plus an overall line, redrawn from the engine's
//! [`ProgressBoard`]. The overall line shows the mean of the per-worker
//! percentages and the sum of their speeds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rangedl_core::ProgressBoard;

const REDRAW_INTERVAL: Duration = Duration::from_millis(120);

/// Spawns the progress UI when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `enabled` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui(
    enabled: bool,
    board: ProgressBoard,
    filename: String,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !enabled {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_bars_inner(board, filename, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_bars_inner(
    board: ProgressBoard,
    filename: String,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let multi = MultiProgress::new();
        let worker_style = ProgressStyle::with_template(
            "{prefix:>10} [{bar:40.cyan/blue}] {pos:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        let total_style =
            ProgressStyle::with_template("{prefix:>10} [{bar:40.green/white}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");

        let bars: Vec<ProgressBar> = (0..board.len())
            .map(|index| {
                let bar = multi.add(ProgressBar::new(100));
                bar.set_style(worker_style.clone());
                bar.set_prefix(format!("worker {index}"));
                bar
            })
            .collect();
        let total = multi.add(ProgressBar::new(100));
        total.set_style(total_style);
        total.set_prefix("total");

        loop {
            let finished = stop.load(Ordering::SeqCst);
            let snapshot = board.snapshot();
            for (index, bar) in bars.iter().enumerate() {
                match snapshot.get(index) {
                    Some((percent, speed)) => {
                        bar.set_position(percent_position(*percent));
                        bar.set_message(format!("{speed:.2} MB/s"));
                    }
                    // Slot dropped by the single-stream fallback.
                    None => {
                        bar.set_position(0);
                        bar.set_message("idle");
                    }
                }
            }
            total.set_position(percent_position(board.overall_percent()));
            total.set_message(format!(
                "{:.2} MB/s  {filename}",
                board.total_speed_mbps()
            ));
            if finished {
                break;
            }
            tokio::time::sleep(REDRAW_INTERVAL).await;
        }

        for bar in &bars {
            bar.finish_and_clear();
        }
        total.finish_and_clear();
    })
}

/// Bar position for a 0..=100 percentage.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent_position(percent: f64) -> u64 {
    percent.clamp(0.0, 100.0).round() as u64
}
