//! Human-readable diagnostic trail kept on each download task.
//!
//! Every entry is also emitted through `tracing`, so the trail and the log
//! stream never disagree. Lines are stored as `[LEVEL] message`.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

/// Shared, append-only list of diagnostic lines.
///
/// Clones append to the same list; workers hold one each.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl DiagnosticLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an informational line.
    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(target: "rangedl::diagnostics", "{message}");
        self.push("INFO", message);
    }

    /// Records a warning line.
    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!(target: "rangedl::diagnostics", "{message}");
        self.push("WARN", message);
    }

    /// Records an error line.
    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!(target: "rangedl::diagnostics", "{message}");
        self.push("ERROR", message);
    }

    fn push(&self, level: &str, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("[{level}] {message}"));
    }

    /// Copy of every line recorded so far, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
