//! Hands applied states to the configuration generator.
//!
//! The generator consumes the latest resolved state of every target. Each applied change bumps a
//! version that the generator watches, so it can rebuild its configuration from a [`snapshot`].
//!
//! [`snapshot`]: Publisher::snapshot

use crate::core::{state::ResolvedState, Deployer, EventKind, ResourceId};
use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use tokio::sync::watch;

#[derive(Debug)]
pub struct Publisher<S> {
    states: RwLock<HashMap<ResourceId, S>>,
    version: watch::Sender<u64>,
}

// === impl Publisher ===

impl<S: ResolvedState> Default for Publisher<S> {
    fn default() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            states: RwLock::new(HashMap::default()),
            version,
        }
    }
}

impl<S: ResolvedState> Publisher<S> {
    /// Watches the number of changes applied so far.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn get(&self, id: &ResourceId) -> Option<S> {
        self.states.read().get(id).cloned()
    }

    /// The published states, ordered by identity.
    pub fn snapshot(&self) -> Vec<S> {
        let mut states = self.states.read().values().cloned().collect::<Vec<_>>();
        states.sort_by(|a, b| a.id().cmp(b.id()));
        states
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[async_trait::async_trait]
impl<S: ResolvedState> Deployer<S> for Publisher<S> {
    async fn apply(&self, kind: EventKind, state: &S) -> anyhow::Result<()> {
        let id = state.id().clone();
        match kind {
            EventKind::Create | EventKind::Update => {
                self.states.write().insert(id.clone(), state.clone());
            }
            EventKind::Delete => {
                if self.states.write().remove(&id).is_none() {
                    tracing::debug!(family = %S::FAMILY, %id, "Deleted state was not published");
                    return Ok(());
                }
            }
        }
        self.bump();
        tracing::debug!(family = %S::FAMILY, %id, %kind, "Published");
        Ok(())
    }
}
