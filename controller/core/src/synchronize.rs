use crate::{
    event::{EventKind, LifecycleEvent, Outcome},
    queue::{LossySender, Receiver},
    state::ResolvedState,
};
use std::sync::Arc;

/// Applies resolved states to the downstream configuration generator.
///
/// Implementations receive the full state on every call and must tolerate repeated application
/// of the same state.
#[async_trait::async_trait]
pub trait Deployer<S>: Send + Sync + 'static {
    async fn apply(&self, kind: EventKind, state: &S) -> anyhow::Result<()>;
}

/// Drains a family's lifecycle events, one at a time, into a [`Deployer`].
#[derive(Debug)]
pub struct Synchronizer<S, D> {
    events: Receiver<LifecycleEvent<S>>,
    deployer: Arc<D>,
    outcomes: LossySender<Outcome>,
}

// === impl Synchronizer ===

impl<S, D> Synchronizer<S, D>
where
    S: ResolvedState,
    D: Deployer<S>,
{
    pub fn new(
        events: Receiver<LifecycleEvent<S>>,
        deployer: Arc<D>,
        outcomes: LossySender<Outcome>,
    ) -> Self {
        Self {
            events,
            deployer,
            outcomes,
        }
    }

    /// Processes events until every producer is dropped.
    ///
    /// Failures to apply an event are logged; the event is not retried. Successfully applied
    /// creations and updates are reported on the outcome queue.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.process(event).await;
        }
        tracing::debug!(family = %S::FAMILY, "Lifecycle events closed");
    }

    async fn process(&self, event: LifecycleEvent<S>) {
        let LifecycleEvent {
            kind,
            state,
            aspects,
        } = event;
        let id = state.id();

        if let Err(error) = self.deployer.apply(kind, &state).await {
            tracing::error!(family = %S::FAMILY, %id, %kind, %error, "Failed to apply state");
            return;
        }
        tracing::info!(family = %S::FAMILY, %id, %kind, ?aspects, "Applied state");

        if let Some(outcome) = kind.outcome() {
            self.outcomes.push(Outcome {
                id: id.clone(),
                family: S::FAMILY,
                kind: outcome,
                aspects,
                generation: state.generation(),
            });
        }
    }
}
