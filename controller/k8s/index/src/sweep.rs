//! Tracks the one-time reconciliation of every stored target after startup.

use std::sync::Arc;
use tokio::sync::watch;

/// Progress of the initial sweep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SweepState {
    NotStarted,
    Sweeping,
    Ready,
}

/// Shared between all handlers of a family so that exactly one of them performs the sweep while
/// the others wait for it to complete.
#[derive(Clone, Debug)]
pub struct Sweep {
    tx: Arc<watch::Sender<SweepState>>,
}

// === impl Sweep ===

impl Default for Sweep {
    fn default() -> Self {
        Self::new()
    }
}

impl Sweep {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SweepState::NotStarted);
        Self { tx: Arc::new(tx) }
    }

    /// Claims the sweep. Returns true for exactly one caller.
    pub fn begin(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == SweepState::NotStarted {
                *state = SweepState::Sweeping;
                return true;
            }
            false
        })
    }

    pub fn finish(&self) {
        self.tx.send_replace(SweepState::Ready);
    }

    /// Waits until the sweep has completed.
    pub async fn ready(&self) {
        let mut rx = self.tx.subscribe();
        // The sender is owned by `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|s| *s == SweepState::Ready).await;
    }

    pub fn state(&self) -> SweepState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SweepState> {
        self.tx.subscribe()
    }
}
