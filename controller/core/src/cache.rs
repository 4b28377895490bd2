//! The authoritative record of what has been deployed for each target resource.

use crate::{
    state::{Aspects, ResolvedState},
    ResourceId,
};
use ahash::AHashMap as HashMap;
use parking_lot::Mutex;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};
use std::sync::Arc;

pub type SharedCache<S> = Arc<StateCache<S>>;

/// Holds the last resolved state of every target resource of one family.
///
/// A single lock guards all entries; it is never held across I/O.
#[derive(Debug)]
pub struct StateCache<S> {
    states: Mutex<HashMap<ResourceId, S>>,
}

/// The result of folding a freshly resolved state into the cache.
#[derive(Clone, Debug, PartialEq)]
pub struct Diff<S> {
    /// The cached state after the update.
    pub state: S,
    /// Labels of the groups that changed, in canonical order and without duplicates.
    pub aspects: Vec<&'static str>,
    pub changed: bool,
    /// True when nothing was cached for the state's identity.
    pub created: bool,
}

#[derive(Debug)]
struct Instrumented<S>(SharedCache<S>);

// === impl StateCache ===

impl<S: ResolvedState> Default for StateCache<S> {
    fn default() -> Self {
        Self {
            states: Mutex::new(HashMap::default()),
        }
    }
}

impl<S: ResolvedState> StateCache<S> {
    pub fn shared() -> SharedCache<S> {
        Arc::new(Self::default())
    }

    /// Returns a copy of the cached state, if any.
    pub fn get(&self, id: &ResourceId) -> Option<S> {
        self.states.lock().get(id).cloned()
    }

    /// Unconditionally replaces the cached state.
    pub fn insert(&self, state: S) {
        let id = state.id().clone();
        self.states.lock().insert(id, state);
    }

    /// Removes and returns the cached state. Deleting an absent entry is a no-op.
    pub fn delete(&self, id: &ResourceId) -> Option<S> {
        self.states.lock().remove(id)
    }

    /// Folds a freshly resolved state into the cache, reporting what changed.
    ///
    /// When nothing is cached for the state's identity, the state is inserted and reported as
    /// changed with its definition and every populated group.
    pub fn compare_and_update(&self, new: S) -> Diff<S> {
        let mut aspects = Aspects::default();
        let mut states = self.states.lock();
        let (state, created) = match states.get_mut(new.id()) {
            Some(cached) => {
                cached.reconcile(new, &mut aspects);
                (cached.clone(), false)
            }
            None => {
                aspects.record(S::FAMILY.definition_label());
                new.populated(&mut aspects);
                states.insert(new.id().clone(), new.clone());
                (new, true)
            }
        };
        drop(states);

        Diff {
            changed: !aspects.is_empty(),
            aspects: aspects.into_vec(),
            state,
            created,
        }
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }

    /// Identities of all cached states.
    pub fn ids(&self) -> Vec<ResourceId> {
        self.states.lock().keys().cloned().collect()
    }

    /// Identities of the cached states matching a predicate, sorted.
    pub fn select(&self, mut f: impl FnMut(&S) -> bool) -> Vec<ResourceId> {
        let mut ids = self
            .states
            .lock()
            .iter()
            .filter(|(_, s)| f(s))
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }
}

// === metrics ===

pub fn register<S: ResolvedState>(reg: &mut Registry, cache: SharedCache<S>) {
    reg.register_collector(Box::new(Instrumented(cache)));
}

impl<S: ResolvedState> Collector for Instrumented<S> {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let mut family = encoder.encode_descriptor(
            "resolved_states",
            "The number of resolved states in the cache",
            None,
            MetricType::Gauge,
        )?;
        let labels = vec![("family", S::FAMILY.kind())];
        let size = ConstGauge::new(self.0.len() as i64);
        let encoder = family.encode_family(&labels)?;
        size.encode(encoder)?;
        Ok(())
    }
}
