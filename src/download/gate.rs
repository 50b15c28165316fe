//! Cooperative pause/resume/cancel signal shared by all workers.
//!
//! Workers call [`PauseGate::checkpoint`] before writing each chunk. While the
//! gate is paused the call parks on a `watch` channel instead of polling, so
//! resume is observed as soon as the flag flips. Bytes already received stay
//! buffered in the worker; nothing is dropped or written twice.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

/// State carried by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Workers write freely.
    Running,
    /// Workers wait before their next write.
    Paused,
    /// Workers stop at their next write.
    Cancelled,
}

/// Outcome of a worker checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Continue writing.
    Proceed,
    /// Stop: the download was cancelled.
    Cancelled,
}

/// Shared gate; clones observe and drive the same state.
#[derive(Debug, Clone)]
pub struct PauseGate {
    state: Arc<watch::Sender<GateState>>,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseGate {
    /// Creates a gate in the running state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Running);
        Self {
            state: Arc::new(state),
        }
    }

    /// Suspends writing. No effect once cancelled.
    pub fn pause(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == GateState::Running {
                *state = GateState::Paused;
                true
            } else {
                false
            }
        });
        if changed {
            info!("download paused");
        }
    }

    /// Resumes writing. No effect once cancelled.
    pub fn resume(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == GateState::Paused {
                *state = GateState::Running;
                true
            } else {
                false
            }
        });
        if changed {
            info!("download resumed");
        }
    }

    /// Stops every worker at its next checkpoint. Irreversible.
    pub fn cancel(&self) {
        let previous = self.state.send_replace(GateState::Cancelled);
        if previous != GateState::Cancelled {
            info!("download cancelled");
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// True while paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state() == GateState::Paused
    }

    /// True once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == GateState::Cancelled
    }

    /// Waits until the gate is not paused.
    pub async fn checkpoint(&self) -> Checkpoint {
        let mut rx = self.state.subscribe();
        let result = rx
            .wait_for(|state| *state != GateState::Paused)
            .await
            .map(|state| *state);
        match result {
            Ok(GateState::Cancelled) => Checkpoint::Cancelled,
            Ok(_) => Checkpoint::Proceed,
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => {
                debug!("pause gate channel closed");
                Checkpoint::Cancelled
            }
        }
    }

    /// Resolves once the gate is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == GateState::Cancelled).await;
    }
}
