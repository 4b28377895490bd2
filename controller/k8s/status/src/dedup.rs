use crate::{Handler, StatusMetrics, Target, Update};
use ahash::AHashMap as HashMap;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::time;

/// Coalesces updates for the same resource, keeping only the latest, until the next flush.
#[derive(Clone, Debug)]
pub struct Deduper {
    pending: Arc<Mutex<HashMap<Target, Update>>>,
    metrics: StatusMetrics,
}

/// Periodically hands the coalesced updates to a [`Handler`].
#[derive(Debug)]
pub struct Flusher {
    pending: Arc<Mutex<HashMap<Target, Update>>>,
    handler: Handler,
    interval: Duration,
}

// === impl Deduper ===

impl Deduper {
    pub fn new(handler: Handler, interval: Duration, metrics: StatusMetrics) -> (Self, Flusher) {
        let pending = Arc::new(Mutex::new(HashMap::default()));
        let deduper = Self {
            pending: pending.clone(),
            metrics,
        };
        let flusher = Flusher {
            pending,
            handler,
            interval,
        };
        (deduper, flusher)
    }

    /// Records an update, replacing any pending update for the same resource.
    pub fn send(&self, update: Update) {
        let family = update.target.family;
        if self
            .pending
            .lock()
            .insert(update.target.clone(), update)
            .is_some()
        {
            self.metrics.coalesced(family);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

// === impl Flusher ===

impl Flusher {
    /// Flushes pending updates on every tick of the interval, forever.
    pub async fn run(&self) {
        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.flush();
        }
    }

    /// Sends every pending update to the handler, in resource order.
    pub fn flush(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        let mut updates = pending.into_values().collect::<Vec<_>>();
        updates.sort_by(|a, b| a.target.cmp(&b.target));
        let n = updates.len();
        for update in updates {
            self.handler.send(update);
        }
        if n > 0 {
            tracing::debug!(updates = n, "Flushed status updates");
        }
        n
    }
}
