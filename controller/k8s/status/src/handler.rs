use crate::{Backoff, Current, Deduper, Error, StatusClient, StatusMetrics, Target};
use apigw_controller_core::queue::{self, LossySender, Receiver};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, error, info_span, Instrument};

/// Computes the desired status from a freshly fetched copy of the resource.
pub type Mutator = Arc<dyn Fn(&Current) -> serde_json::Result<serde_json::Value> + Send + Sync>;

/// A request to bring a resource's status up to date.
#[derive(Clone)]
pub struct Update {
    pub target: Target,
    pub mutate: Mutator,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub queue_capacity: usize,
    /// Bounds the time spent on one update, including retries.
    pub timeout: Duration,
    /// Requests are coalesced over this interval. Zero disables coalescing.
    pub flush_interval: Duration,
    pub backoff: Backoff,
}

/// Queues status updates for a single [`Worker`]. Never blocks the caller: when the queue is full,
/// the update is dropped.
#[derive(Clone, Debug)]
pub struct Handler {
    tx: LossySender<Update>,
    metrics: StatusMetrics,
}

/// Writes queued status updates, one at a time.
pub struct Worker<C> {
    rx: Receiver<Update>,
    client: Arc<C>,
    timeout: Duration,
    backoff: Backoff,
    metrics: StatusMetrics,
}

/// Either mode of submitting status updates.
#[derive(Clone, Debug)]
pub enum Sender {
    Direct(Handler),
    Deduped(Deduper),
}

enum Written {
    Patched,
    Unchanged,
}

// === impl Update ===

impl Update {
    pub fn new(
        target: Target,
        mutate: impl Fn(&Current) -> serde_json::Result<serde_json::Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            target,
            mutate: Arc::new(mutate),
        }
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

// === impl Config ===

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            timeout: Duration::from_secs(10),
            flush_interval: Duration::from_secs(2),
            backoff: Backoff::default(),
        }
    }
}

// === impl Handler ===

impl Handler {
    pub fn new<C: StatusClient>(
        client: Arc<C>,
        config: &Config,
        metrics: StatusMetrics,
    ) -> (Self, Worker<C>) {
        let (tx, rx) = queue::lossy(config.queue_capacity, "status");
        let handler = Self {
            tx,
            metrics: metrics.clone(),
        };
        let worker = Worker {
            rx,
            client,
            timeout: config.timeout,
            backoff: config.backoff.clone(),
            metrics,
        };
        (handler, worker)
    }

    /// Queues an update. Returns false if it was dropped.
    pub fn send(&self, update: Update) -> bool {
        let family = update.target.family;
        if self.tx.push(update) {
            self.metrics.sent(family);
            true
        } else {
            self.metrics.dropped(family);
            false
        }
    }
}

// === impl Worker ===

impl<C: StatusClient> Worker<C> {
    /// Processes updates until every [`Handler`] is dropped.
    pub async fn run(mut self) {
        while let Some(update) = self.rx.recv().await {
            let target = update.target.clone();
            self.process(update)
                .instrument(info_span!("status", %target))
                .await;
        }
        debug!("Status updates closed");
    }

    async fn process(&self, update: Update) {
        let family = update.target.family;
        let write = self.backoff.retry(|| self.write(&update));
        match tokio::time::timeout(self.timeout, write).await {
            Ok(Ok(Written::Patched)) => {
                debug!("Patched status");
                self.metrics.succeeded(family);
            }
            Ok(Ok(Written::Unchanged)) => {
                debug!("Status unchanged");
                self.metrics.skipped(family);
            }
            Ok(Err(Error::NotFound)) => {
                debug!("Resource not found; dropping status update");
                self.metrics.not_found(family);
            }
            Ok(Err(error)) => {
                error!(%error, "Failed to update status");
                self.metrics.failed(family);
            }
            Err(_) => {
                error!(timeout = ?self.timeout, "Timed out updating status");
                self.metrics.failed(family);
            }
        }
    }

    /// Fetches the resource and patches its status if the mutator changes it.
    async fn write(&self, update: &Update) -> Result<Written, Error> {
        let current = self
            .client
            .fetch(&update.target)
            .await?
            .ok_or(Error::NotFound)?;
        let status = (update.mutate)(&current).map_err(|e| Error::Other(e.into()))?;
        if status == current.status {
            return Ok(Written::Unchanged);
        }
        self.client
            .patch_status(
                &update.target,
                current.resource_version.as_deref(),
                status,
            )
            .await?;
        Ok(Written::Patched)
    }
}

// === impl Sender ===

impl Sender {
    pub fn send(&self, update: Update) {
        match self {
            Self::Direct(handler) => {
                handler.send(update);
            }
            Self::Deduped(deduper) => deduper.send(update),
        }
    }
}
