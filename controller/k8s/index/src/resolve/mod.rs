//! Resolution of target resources into their complete, effective configuration.

mod api;
mod convert;
mod gateway;

use crate::store::{Indexed, Kind, Store};
use apigw_controller_core::{state::ResolvedState, ResourceId};
use apigw_controller_k8s_api as k8s;
use std::sync::Arc;

/// Settings that influence which targets are resolved.
#[derive(Clone, Debug)]
pub struct Config {
    /// Gateways are managed only when their class names this controller.
    pub controller_name: String,
}

/// A target could not be resolved; its previously resolved state stays in effect.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{kind} {id} not found")]
    Missing { kind: Kind, id: ResourceId },

    #[error("{kind} {id} targets a resource in namespace {target_namespace}")]
    NamespaceMismatch {
        kind: Kind,
        id: ResourceId,
        target_namespace: String,
    },

    #[error("{kind} {id} references an unsupported target: {reason}")]
    InvalidTarget {
        kind: Kind,
        id: ResourceId,
        reason: String,
    },

    #[error("{kind} {id} is invalid: {reason}")]
    InvalidDefinition {
        kind: Kind,
        id: ResourceId,
        reason: String,
    },
}

/// A family of target resources that can be resolved from the store.
pub trait Resolve: ResolvedState {
    /// The kind of the target resource.
    type Target: Indexed;

    /// Resolves a target. Returns `None` when the target does not exist or is not managed by
    /// this controller.
    fn resolve(
        store: &Store,
        config: &Config,
        id: &ResourceId,
    ) -> Option<Result<Self, ResolveError>>;

    /// Finds the targets whose resolution may depend on the given resource, as it is currently
    /// stored.
    fn affected(store: &Store, kind: Kind, id: &ResourceId) -> Vec<ResourceId>;

    /// Returns true if this resolved state was built using the given resource.
    fn references(&self, kind: Kind, id: &ResourceId) -> bool;

    /// Every target currently in the store.
    fn targets(store: &Store) -> Vec<ResourceId> {
        store
            .list::<Self::Target>(None)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }
}

fn require<T: Indexed>(store: &Store, id: ResourceId) -> Result<Arc<T>, ResolveError> {
    store.get::<T>(&id).ok_or(ResolveError::Missing { kind: T::KIND, id })
}

/// Backends in the resource's namespace that read a Secret or ConfigMap.
fn backends_reading(store: &Store, kind: Kind, id: &ResourceId) -> Vec<ResourceId> {
    store
        .list::<k8s::Backend>(Some(id.namespace.as_str()))
        .into_iter()
        .filter(|(_, backend)| match kind {
            Kind::Secret => backend.spec.secret_names().any(|name| name == id.name),
            Kind::ConfigMap => backend.spec.config_map_names().any(|name| name == id.name),
            _ => false,
        })
        .map(|(backend_id, _)| backend_id)
        .collect()
}
