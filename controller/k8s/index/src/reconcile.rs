//! Turns resource notifications into lifecycle events for the affected targets.

use crate::{
    resolve::{Config, Resolve},
    store::{Kind, Notification, SharedStore},
    sweep::Sweep,
};
use apigw_controller_core::{
    queue::{BlockingSender, Receiver},
    EventKind, LifecycleEvent, ResourceId, SharedCache,
};
use tracing::{debug, debug_span, info, warn, Instrument};

/// Re-resolves the targets of one family and emits an event for each one that changed.
///
/// A reconciler handles one notification at a time, so the events of a target reach the
/// synchronizer in the order its cache was updated.
pub struct Reconciler<S> {
    store: SharedStore,
    config: Config,
    cache: SharedCache<S>,
    events: BlockingSender<LifecycleEvent<S>>,
    sweep: Sweep,
}

// === impl Reconciler ===

impl<S: Resolve> Reconciler<S> {
    pub fn new(
        store: SharedStore,
        config: Config,
        cache: SharedCache<S>,
        events: BlockingSender<LifecycleEvent<S>>,
        sweep: Sweep,
    ) -> Self {
        Self {
            store,
            config,
            cache,
            events,
            sweep,
        }
    }

    /// Resolves every stored and cached target once.
    pub async fn sweep(&self) {
        let mut targets = S::targets(&self.store.read());
        targets.extend(self.cache.ids());
        targets.sort();
        targets.dedup();
        info!(family = %S::FAMILY, targets = targets.len(), "Reconciling all targets");
        for id in targets {
            self.reconcile(&id).await;
        }
    }

    /// Resolves a target and folds it into the cache, emitting an event if anything changed.
    ///
    /// Returns the kind of event emitted, if any.
    pub async fn reconcile(&self, id: &ResourceId) -> Option<EventKind> {
        // The store lock must be released before waiting on the event queue.
        let resolved = S::resolve(&self.store.read(), &self.config, id);

        let event = match resolved {
            None => {
                let state = self.cache.delete(id)?;
                LifecycleEvent::delete(state)
            }
            Some(Err(error)) => {
                warn!(family = %S::FAMILY, %id, %error, "Failed to resolve");
                return None;
            }
            Some(Ok(state)) => {
                let diff = self.cache.compare_and_update(state);
                if !diff.changed {
                    debug!(family = %S::FAMILY, %id, "Unchanged");
                    return None;
                }
                if diff.created {
                    LifecycleEvent::create(diff.state, diff.aspects)
                } else {
                    LifecycleEvent::update(diff.state, diff.aspects)
                }
            }
        };

        let kind = event.kind;
        debug!(family = %S::FAMILY, %id, %kind, aspects = ?event.aspects, "Queueing event");
        if self.events.push(event).await.is_err() {
            debug!(family = %S::FAMILY, %id, "Event queue closed");
            return None;
        }
        Some(kind)
    }

    /// Handles notifications until every notifier is dropped.
    ///
    /// While the event queue is full the reconciler waits, its notification queue fills and the
    /// watches feeding the store stall.
    pub async fn run(self, mut notifications: Receiver<Notification>) {
        while let Some(Notification { kind, id }) = notifications.recv().await {
            let span = debug_span!("changed", %kind, %id);
            self.on_resource_changed(kind, &id).instrument(span).await;
        }
        debug!(family = %S::FAMILY, "Notifications closed");
    }

    /// Re-resolves every target that may depend on a changed resource.
    ///
    /// The first change runs the initial sweep. Changes that arrive while it runs wait for it
    /// to finish.
    pub async fn on_resource_changed(&self, kind: Kind, id: &ResourceId) {
        if self.sweep.begin() {
            self.sweep().await;
            self.sweep.finish();
            info!(family = %S::FAMILY, "Initial reconciliation complete");
        } else {
            self.sweep.ready().await;
        }

        let mut targets = S::affected(&self.store.read(), kind, id);
        targets.extend(self.cache.select(|s| s.references(kind, id)));
        targets.sort();
        targets.dedup();
        for target in targets {
            self.reconcile(&target).await;
        }
    }
}
