mod api;
mod notify;

use crate::{Config, Notification, Outbox, Reconciler, Resolve, SharedStore, Store, Sweep};
use apigw_controller_core::{
    queue::{self, Receiver},
    LifecycleEvent, ResolvedState, ResourceId, SharedCache, StateCache, CONTROLLER_NAME,
};
use apigw_controller_k8s_api::{self as k8s, gateway, ObjectMeta};
use kubert::index::IndexNamespacedResource;

const NS: &str = "ns";

fn id(name: &str) -> ResourceId {
    ResourceId::new(NS, name)
}

fn config() -> Config {
    Config {
        controller_name: CONTROLLER_NAME.to_string(),
    }
}

fn meta(name: &str, generation: i64) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NS.to_string()),
        uid: Some(format!("{name}-uid")),
        generation: Some(generation),
        ..Default::default()
    }
}

fn target_ref(kind: &str, name: &str) -> k8s::NamespacedTargetRef {
    k8s::NamespacedTargetRef {
        group: None,
        kind: kind.to_string(),
        name: name.to_string(),
        namespace: None,
    }
}

fn mk_api(name: &str, generation: i64, routes: &[&str]) -> k8s::Api {
    let mut api = k8s::Api::new(
        name,
        k8s::ApiSpec {
            api_name: name.to_string(),
            api_version: "v1".to_string(),
            base_path: format!("/{name}/v1"),
            api_type: "REST".to_string(),
            production: vec![k8s::api::EnvConfig {
                route_refs: routes.iter().map(|r| r.to_string()).collect(),
            }],
            ..Default::default()
        },
    );
    api.metadata = meta(name, generation);
    api
}

fn mk_route(name: &str, spec: serde_json::Value) -> gateway::HttpRoute {
    let spec = serde_json::from_value(spec).expect("route spec must be valid");
    let mut route = gateway::HttpRoute::new(name, spec);
    route.metadata = meta(name, 1);
    route
}

fn mk_backend(name: &str, port: u16) -> k8s::Backend {
    let mut backend = k8s::Backend::new(
        name,
        k8s::BackendSpec {
            services: vec![k8s::backend::Service {
                host: format!("{name}.{NS}.svc"),
                port,
            }],
            protocol: "http".to_string(),
            ..Default::default()
        },
    );
    backend.metadata = meta(name, 1);
    backend
}

fn mk_secret(name: &str, data: &[(&str, &str)]) -> k8s::Secret {
    k8s::Secret {
        metadata: meta(name, 1),
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), k8s::ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

fn mk_config_map(name: &str, data: &[(&str, &str)]) -> k8s::ConfigMap {
    k8s::ConfigMap {
        metadata: meta(name, 1),
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

fn mk_rate_limit(
    name: &str,
    target: k8s::NamespacedTargetRef,
    default: Option<u32>,
    overrides: Option<u32>,
) -> k8s::RateLimitPolicy {
    let limit = |requests_per_unit| k8s::rate_limit_policy::RateLimit {
        api: Some(k8s::rate_limit_policy::Limit {
            requests_per_unit,
            unit: "Minute".to_string(),
        }),
        custom: None,
    };
    let mut policy = k8s::RateLimitPolicy::new(
        name,
        k8s::RateLimitPolicySpec {
            target_ref: target,
            default: default.map(limit),
            overrides: overrides.map(limit),
        },
    );
    policy.metadata = meta(name, 1);
    policy
}

/// A reconciler with its store, cache and queues.
struct Harness<S> {
    store: SharedStore,
    outbox: Outbox,
    cache: SharedCache<S>,
    events: Receiver<LifecycleEvent<S>>,
    reconciler: Reconciler<S>,
    sweep: Sweep,
}

impl<S: Resolve> Harness<S> {
    fn new() -> Self {
        Self::with_event_capacity(100)
    }

    fn with_event_capacity(capacity: usize) -> Self {
        let outbox = Outbox::default();
        let store = Store::shared(None, outbox.clone());
        let cache = StateCache::shared();
        let (events_tx, events) = queue::blocking(capacity);
        let sweep = Sweep::new();
        let reconciler = Reconciler::new(
            store.clone(),
            config(),
            cache.clone(),
            events_tx,
            sweep.clone(),
        );
        Self {
            store,
            outbox,
            cache,
            events,
            reconciler,
            sweep,
        }
    }

    fn apply<T>(&self, resource: T)
    where
        Store: IndexNamespacedResource<T>,
    {
        self.store.write().apply(resource);
    }

    /// Handles every pending notification and returns the events that were queued.
    async fn settle(&mut self) -> Vec<LifecycleEvent<S>> {
        while let Some(Notification { kind, id }) = self.outbox.pop() {
            self.reconciler.on_resource_changed(kind, &id).await;
        }
        let mut events = Vec::new();
        while let Some(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn cached(&self, id: &ResourceId) -> Option<S> {
        let state = self.cache.get(id)?;
        assert_eq!(state.id(), id);
        Some(state)
    }
}
