//! Instruments the store with the resources it holds and the changes watches apply to it.

use crate::store::{Indexed, Kind, SharedStore, Store};
use kube::ResourceExt;
use kubert::index::{
    ClusterRemoved, IndexClusterResource, IndexNamespacedResource, NamespacedRemoved,
};
use parking_lot::RwLock;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::sync::Arc;

/// Sits between the watches and the [`Store`], counting what each watch applies.
pub struct IndexMetrics {
    store: SharedStore,

    stored: Family<StoredLabels, Gauge>,
    applied: Family<StoredLabels, Counter>,
    deleted: Family<StoredLabels, Counter>,
    restarts: Family<KindLabels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct StoredLabels {
    kind: String,
    namespace: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: String,
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(store: SharedStore, prom: &mut Registry) -> Self {
        let stored = Family::default();
        prom.register(
            "resources",
            "Number of gateway resources held in the store",
            stored.clone(),
        );

        let applied = Family::default();
        prom.register(
            "applies",
            "Count of resources created or updated by a watch",
            applied.clone(),
        );

        let deleted = Family::default();
        prom.register(
            "deletes",
            "Count of resources removed by a watch",
            deleted.clone(),
        );

        let restarts = Family::default();
        prom.register(
            "restarts",
            "Count of watch restarts that replaced every stored resource of a kind",
            restarts.clone(),
        );

        Self {
            store,
            stored,
            applied,
            deleted,
            restarts,
        }
    }

    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    fn observe<R: Indexed>(&self, namespace: &str) {
        let count = self.store.read().len_in::<R>(namespace);
        self.stored
            .get_or_create(&StoredLabels::new(R::KIND, namespace))
            .set(count as i64);
    }

    #[cfg(test)]
    pub(crate) fn stored(&self, kind: Kind, namespace: &str) -> i64 {
        self.stored
            .get_or_create(&StoredLabels::new(kind, namespace))
            .get()
    }
}

impl<R> IndexNamespacedResource<R> for IndexMetrics
where
    R: Indexed,
    Store: IndexNamespacedResource<R>,
{
    fn apply(&mut self, resource: R) {
        let namespace = resource.namespace().unwrap_or_default();
        self.applied
            .get_or_create(&StoredLabels::new(R::KIND, &namespace))
            .inc();
        IndexNamespacedResource::apply(&mut *self.store.write(), resource);
        self.observe::<R>(&namespace);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.deleted
            .get_or_create(&StoredLabels::new(R::KIND, &namespace))
            .inc();
        IndexNamespacedResource::<R>::delete(&mut *self.store.write(), namespace.clone(), name);
        self.observe::<R>(&namespace);
    }

    fn reset(&mut self, resources: Vec<R>, removed: NamespacedRemoved) {
        let mut namespaces = resources
            .iter()
            .filter_map(|r| r.namespace())
            .chain(removed.keys().cloned())
            .collect::<Vec<_>>();
        namespaces.sort();
        namespaces.dedup();

        self.restarts.get_or_create(&KindLabels::new(R::KIND)).inc();
        IndexNamespacedResource::reset(&mut *self.store.write(), resources, removed);
        for namespace in namespaces {
            self.observe::<R>(&namespace);
        }
    }
}

/// Cluster-scoped resources are counted under an empty namespace.
impl<R> IndexClusterResource<R> for IndexMetrics
where
    R: Indexed,
    Store: IndexClusterResource<R>,
{
    fn apply(&mut self, resource: R) {
        self.applied
            .get_or_create(&StoredLabels::new(R::KIND, ""))
            .inc();
        IndexClusterResource::apply(&mut *self.store.write(), resource);
        self.observe::<R>("");
    }

    fn delete(&mut self, name: String) {
        self.deleted
            .get_or_create(&StoredLabels::new(R::KIND, ""))
            .inc();
        IndexClusterResource::<R>::delete(&mut *self.store.write(), name);
        self.observe::<R>("");
    }

    fn reset(&mut self, resources: Vec<R>, removed: ClusterRemoved) {
        self.restarts.get_or_create(&KindLabels::new(R::KIND)).inc();
        IndexClusterResource::reset(&mut *self.store.write(), resources, removed);
        self.observe::<R>("");
    }
}

// === impl StoredLabels ===

impl StoredLabels {
    fn new(kind: Kind, namespace: &str) -> Self {
        Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

// === impl KindLabels ===

impl KindLabels {
    fn new(kind: Kind) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}
