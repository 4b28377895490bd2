//! Watched resources, indexed by identity.
//!
//! The store is fed by `kubert::index` and is the only source resolution reads from. Every
//! change is recorded in the [`Outbox`] as a [`Notification`] so that affected targets can be
//! re-resolved.

use crate::notify::Outbox;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use apigw_controller_core::ResourceId;
use apigw_controller_k8s_api::{self as k8s, gateway, ResourceExt};
use parking_lot::RwLock;
use std::{fmt, sync::Arc};

pub type SharedStore = Arc<RwLock<Store>>;

/// The kinds of resources the store holds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Api,
    HttpRoute,
    Gateway,
    GatewayClass,
    Authentication,
    RateLimitPolicy,
    ApiPolicy,
    Backend,
    InterceptorService,
    BackendJwt,
    TokenIssuer,
    Secret,
    ConfigMap,
}

/// Announces that a resource was applied or deleted.
///
/// Cluster-scoped resources carry an empty namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub kind: Kind,
    pub id: ResourceId,
}

pub struct Store {
    namespaces: Option<HashSet<String>>,
    outbox: Outbox,

    apis: Resources<k8s::Api>,
    routes: Resources<gateway::HttpRoute>,
    gateways: Resources<gateway::Gateway>,
    gateway_classes: Resources<gateway::GatewayClass>,
    authentications: Resources<k8s::Authentication>,
    rate_limit_policies: Resources<k8s::RateLimitPolicy>,
    api_policies: Resources<k8s::ApiPolicy>,
    backends: Resources<k8s::Backend>,
    interceptor_services: Resources<k8s::InterceptorService>,
    backend_jwts: Resources<k8s::BackendJwt>,
    token_issuers: Resources<k8s::TokenIssuer>,
    secrets: Resources<k8s::Secret>,
    config_maps: Resources<k8s::ConfigMap>,
}

pub type Resources<T> = HashMap<ResourceId, Arc<T>>;

/// A resource kind held by the [`Store`].
pub trait Indexed: kube::Resource<DynamicType = ()> + Send + Sync + 'static {
    const KIND: Kind;

    fn resources(store: &Store) -> &Resources<Self>;

    fn resources_mut(store: &mut Store) -> &mut Resources<Self>;
}

// === impl Kind ===

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Api => "API",
            Self::HttpRoute => "HTTPRoute",
            Self::Gateway => "Gateway",
            Self::GatewayClass => "GatewayClass",
            Self::Authentication => "Authentication",
            Self::RateLimitPolicy => "RateLimitPolicy",
            Self::ApiPolicy => "APIPolicy",
            Self::Backend => "Backend",
            Self::InterceptorService => "InterceptorService",
            Self::BackendJwt => "BackendJWT",
            Self::TokenIssuer => "TokenIssuer",
            Self::Secret => "Secret",
            Self::ConfigMap => "ConfigMap",
        };
        kind.fmt(f)
    }
}

// === impl Store ===

impl Store {
    pub fn shared(namespaces: Option<Vec<String>>, outbox: Outbox) -> SharedStore {
        Arc::new(RwLock::new(Self {
            namespaces: namespaces.map(|ns| ns.into_iter().collect()),
            outbox,
            apis: Resources::default(),
            routes: Resources::default(),
            gateways: Resources::default(),
            gateway_classes: Resources::default(),
            authentications: Resources::default(),
            rate_limit_policies: Resources::default(),
            api_policies: Resources::default(),
            backends: Resources::default(),
            interceptor_services: Resources::default(),
            backend_jwts: Resources::default(),
            token_issuers: Resources::default(),
            secrets: Resources::default(),
            config_maps: Resources::default(),
        }))
    }

    /// Looks up a resource by identity. Absence is not an error: the resource may have been
    /// deleted.
    pub fn get<T: Indexed>(&self, id: &ResourceId) -> Option<Arc<T>> {
        T::resources(self).get(id).cloned()
    }

    /// Lists resources of a kind, optionally restricted to a namespace, ordered by identity.
    pub fn list<T: Indexed>(&self, namespace: Option<&str>) -> Vec<(ResourceId, Arc<T>)> {
        let mut resources = T::resources(self)
            .iter()
            .filter(|(id, _)| namespace.map_or(true, |ns| id.namespace == ns))
            .map(|(id, r)| (id.clone(), r.clone()))
            .collect::<Vec<_>>();
        resources.sort_by(|(a, _), (b, _)| a.cmp(b));
        resources
    }

    pub fn len<T: Indexed>(&self) -> usize {
        T::resources(self).len()
    }

    /// The number of resources of a kind in a namespace.
    pub fn len_in<T: Indexed>(&self, namespace: &str) -> usize {
        T::resources(self)
            .keys()
            .filter(|id| id.namespace == namespace)
            .count()
    }

    fn is_watched(&self, namespace: &str) -> bool {
        match &self.namespaces {
            // Cluster-scoped resources are always watched.
            Some(namespaces) => namespace.is_empty() || namespaces.contains(namespace),
            None => true,
        }
    }

    fn insert<T: Indexed>(&mut self, id: ResourceId, resource: T) {
        if !self.is_watched(&id.namespace) {
            return;
        }
        tracing::trace!(kind = %T::KIND, %id, "Applied");
        T::resources_mut(self).insert(id.clone(), Arc::new(resource));
        self.notify(T::KIND, id);
    }

    fn remove<T: Indexed>(&mut self, id: ResourceId) {
        if T::resources_mut(self).remove(&id).is_some() {
            tracing::trace!(kind = %T::KIND, %id, "Deleted");
            self.notify(T::KIND, id);
        }
    }

    fn notify(&self, kind: Kind, id: ResourceId) {
        self.outbox.push(Notification { kind, id });
    }
}

impl<T: Indexed> kubert::index::IndexNamespacedResource<T> for Store {
    fn apply(&mut self, resource: T) {
        let namespace = resource.namespace().unwrap_or_default();
        let id = ResourceId::new(namespace, resource.name_unchecked());
        self.insert(id, resource);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.remove::<T>(ResourceId::new(namespace, name));
    }
}

impl kubert::index::IndexClusterResource<gateway::GatewayClass> for Store {
    fn apply(&mut self, resource: gateway::GatewayClass) {
        let id = ResourceId::new("", resource.name_unchecked());
        self.insert(id, resource);
    }

    fn delete(&mut self, name: String) {
        self.remove::<gateway::GatewayClass>(ResourceId::new("", name));
    }
}

// === impl Indexed ===

macro_rules! indexed {
    ($($ty:ty => $kind:ident, $field:ident;)+) => {
        $(
            impl Indexed for $ty {
                const KIND: Kind = Kind::$kind;

                fn resources(store: &Store) -> &Resources<Self> {
                    &store.$field
                }

                fn resources_mut(store: &mut Store) -> &mut Resources<Self> {
                    &mut store.$field
                }
            }
        )+
    };
}

indexed! {
    k8s::Api => Api, apis;
    gateway::HttpRoute => HttpRoute, routes;
    gateway::Gateway => Gateway, gateways;
    gateway::GatewayClass => GatewayClass, gateway_classes;
    k8s::Authentication => Authentication, authentications;
    k8s::RateLimitPolicy => RateLimitPolicy, rate_limit_policies;
    k8s::ApiPolicy => ApiPolicy, api_policies;
    k8s::Backend => Backend, backends;
    k8s::InterceptorService => InterceptorService, interceptor_services;
    k8s::BackendJwt => BackendJwt, backend_jwts;
    k8s::TokenIssuer => TokenIssuer, token_issuers;
    k8s::Secret => Secret, secrets;
    k8s::ConfigMap => ConfigMap, config_maps;
}
