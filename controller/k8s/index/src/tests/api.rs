use super::{
    id, meta, mk_api, mk_backend, mk_config_map, mk_rate_limit, mk_route, mk_secret, target_ref,
    Harness, NS,
};
use crate::{Kind, SweepState};
use apigw_controller_core::{
    state::{BackendSecurity, PathMatch, Retry, Timeout},
    ApiState, EventKind, LifecycleEvent, ResolvedState, ResourceId,
};
use apigw_controller_k8s_api::{self as k8s, api_policy::LocalRef, backend};
use kubert::index::IndexNamespacedResource;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::{assert_pending, assert_ready, task};

fn orders_route(policy: Option<(&str, &str)>) -> k8s::gateway::HttpRoute {
    let filters = policy
        .map(|(kind, name)| {
            vec![json!({
                "type": "ExtensionRef",
                "extensionRef": {"group": k8s::GROUP, "kind": kind, "name": name},
            })]
        })
        .unwrap_or_default();
    mk_route(
        "prod-route",
        json!({
            "hostnames": ["api.example.com"],
            "rules": [{
                "matches": [{"path": {"type": "PathPrefix", "value": "/orders"}}],
                "filters": filters,
                "backendRefs": [{
                    "group": k8s::GROUP,
                    "kind": "Backend",
                    "name": "backend",
                    "port": 8080,
                }],
            }],
        }),
    )
}

fn summary(events: &[LifecycleEvent<ApiState>]) -> Vec<(EventKind, ResourceId, Vec<&'static str>)> {
    events
        .iter()
        .map(|e| (e.kind, e.state.id().clone(), e.aspects.clone()))
        .collect()
}

fn effective_rate(state: &ApiState, path: &str) -> Option<u32> {
    state
        .derived
        .resources
        .iter()
        .find(|r| r.path == PathMatch::Prefix(path.to_string()))?
        .rate_limit
        .as_ref()?
        .api
        .as_ref()
        .map(|l| l.requests_per_unit)
}

#[tokio::test]
async fn resource_policy_applied_after_creation() {
    let mut h = Harness::<ApiState>::new();
    h.apply(mk_backend("backend", 8080));
    h.apply(orders_route(Some(("RateLimitPolicy", "rl-b"))));
    h.apply(mk_api("api1", 1, &["prod-route"]));
    h.apply(mk_rate_limit(
        "rl-a",
        target_ref("API", "api1"),
        Some(100),
        None,
    ));

    let events = h.settle().await;
    assert_eq!(
        summary(&events),
        vec![(
            EventKind::Create,
            id("api1"),
            vec!["API Definition", "RateLimitPolicies"]
        )]
    );
    assert_eq!(effective_rate(&events[0].state, "/orders"), Some(100));

    // Reapplying an unchanged definition emits nothing.
    h.apply(mk_api("api1", 1, &["prod-route"]));
    assert_eq!(summary(&h.settle().await), vec![]);

    h.apply(mk_rate_limit(
        "rl-b",
        target_ref("Resource", "api1"),
        None,
        Some(50),
    ));
    let events = h.settle().await;
    assert_eq!(
        summary(&events),
        vec![(
            EventKind::Update,
            id("api1"),
            vec!["Resource RateLimitPolicies"]
        )]
    );
    assert_eq!(effective_rate(&events[0].state, "/orders"), Some(50));

    let cached = h.cached(&id("api1")).expect("api must be cached");
    assert_eq!(effective_rate(&cached, "/orders"), Some(50));
    assert_eq!(
        cached
            .derived
            .rate_limit
            .and_then(|rl| rl.api)
            .map(|l| l.requests_per_unit),
        Some(100)
    );
}

#[tokio::test]
async fn deleted_api_emits_delete() {
    let mut h = Harness::<ApiState>::new();
    h.apply(mk_backend("backend", 8080));
    h.apply(orders_route(None));
    h.apply(mk_api("api1", 1, &["prod-route"]));
    assert_eq!(h.settle().await.len(), 1);

    IndexNamespacedResource::<k8s::Api>::delete(
        &mut *h.store.write(),
        NS.to_string(),
        "api1".to_string(),
    );
    let events = h.settle().await;
    assert_eq!(
        summary(&events),
        vec![(EventKind::Delete, id("api1"), vec![])]
    );
    assert!(h.cached(&id("api1")).is_none());
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn missing_backend_defers_creation() {
    let mut h = Harness::<ApiState>::new();
    h.apply(orders_route(None));
    h.apply(mk_api("api1", 1, &["prod-route"]));
    assert_eq!(summary(&h.settle().await), vec![]);
    assert!(h.cache.is_empty());

    h.apply(mk_backend("backend", 8080));
    let events = h.settle().await;
    assert_eq!(
        summary(&events),
        vec![(EventKind::Create, id("api1"), vec!["API Definition"])]
    );
    assert_eq!(
        events[0].state.backends[&id("backend")].services[0].port,
        8080
    );

    // Backends are compared by content.
    h.apply(mk_backend("backend", 9090));
    assert_eq!(
        summary(&h.settle().await),
        vec![(EventKind::Update, id("api1"), vec!["Backend Properties"])]
    );
}

#[tokio::test]
async fn cross_namespace_policy_rejected() {
    let mut h = Harness::<ApiState>::new();
    h.apply(mk_backend("backend", 8080));
    h.apply(orders_route(None));
    h.apply(mk_api("api1", 1, &["prod-route"]));
    assert_eq!(h.settle().await.len(), 1);

    let mut target = target_ref("API", "api1");
    target.namespace = Some(NS.to_string());
    let mut policy = mk_rate_limit("rl-a", target, Some(100), None);
    policy.metadata.namespace = Some("other".to_string());
    h.apply(policy);

    assert_eq!(summary(&h.settle().await), vec![]);
    let cached = h.cached(&id("api1")).expect("api must remain cached");
    assert!(cached.rate_limit_policies.is_empty());
}

#[tokio::test]
async fn interceptor_changes_propagate() {
    let mut h = Harness::<ApiState>::new();
    h.apply(mk_backend("backend", 8080));
    h.apply(mk_backend("interceptor-backend", 9000));
    h.apply(orders_route(None));
    h.apply(mk_api("api1", 1, &["prod-route"]));

    let mut policy = k8s::ApiPolicy::new(
        "policy",
        k8s::ApiPolicySpec {
            target_ref: target_ref("API", "api1"),
            default: Some(k8s::api_policy::PolicySpec {
                request_interceptors: vec![LocalRef {
                    name: "interceptor".to_string(),
                }],
                ..Default::default()
            }),
            overrides: None,
        },
    );
    policy.metadata = meta("policy", 1);
    h.apply(policy);

    let interceptor = |generation| {
        let mut interceptor = k8s::InterceptorService::new(
            "interceptor",
            k8s::InterceptorServiceSpec {
                backend_ref: LocalRef {
                    name: "interceptor-backend".to_string(),
                },
                includes: vec!["request_headers".to_string()],
            },
        );
        interceptor.metadata = meta("interceptor", generation);
        interceptor
    };
    h.apply(interceptor(1));

    let events = h.settle().await;
    assert_eq!(
        summary(&events),
        vec![(
            EventKind::Create,
            id("api1"),
            vec!["API Definition", "APIPolicies", "Interceptor Services"]
        )]
    );
    assert!(events[0]
        .state
        .backends
        .contains_key(&id("interceptor-backend")));

    h.apply(interceptor(2));
    assert_eq!(
        summary(&h.settle().await),
        vec![(EventKind::Update, id("api1"), vec!["Interceptor Services"])]
    );
}

#[tokio::test]
async fn first_change_sweeps_every_target() {
    let mut h = Harness::<ApiState>::new();
    h.apply(mk_backend("backend", 8080));
    h.apply(orders_route(None));
    h.apply(mk_api("api1", 1, &["prod-route"]));
    h.apply(mk_api("api2", 1, &["prod-route"]));
    assert_eq!(h.sweep.state(), SweepState::NotStarted);

    // Only the backend's notification is handled; the sweep reaches both APIs.
    h.reconciler
        .on_resource_changed(Kind::Backend, &id("backend"))
        .await;
    assert_eq!(h.sweep.state(), SweepState::Ready);

    let mut events = Vec::new();
    while let Some(event) = h.events.try_recv() {
        events.push(event);
    }
    assert_eq!(
        summary(&events),
        vec![
            (EventKind::Create, id("api1"), vec!["API Definition"]),
            (EventKind::Create, id("api2"), vec!["API Definition"]),
        ]
    );
}

#[tokio::test]
async fn api_without_routes_is_invalid() {
    let mut h = Harness::<ApiState>::new();
    h.apply(mk_api("api1", 1, &[]));
    assert_eq!(summary(&h.settle().await), vec![]);
    assert!(h.cache.is_empty());
}

#[tokio::test]
async fn concurrent_changes_share_one_sweep() {
    let mut h = Harness::<ApiState>::with_event_capacity(1);
    h.apply(mk_backend("backend", 8080));
    h.apply(orders_route(None));
    for name in ["api1", "api2", "api3"] {
        h.apply(mk_api(name, 1, &["prod-route"]));
    }
    h.outbox.drain();

    let (backend_id, api_id, route_id) = (id("backend"), id("api2"), id("prod-route"));
    let mut backend = task::spawn(h.reconciler.on_resource_changed(Kind::Backend, &backend_id));
    let mut api = task::spawn(h.reconciler.on_resource_changed(Kind::Api, &api_id));
    let mut route = task::spawn(h.reconciler.on_resource_changed(Kind::HttpRoute, &route_id));

    // The first change sweeps; the others wait for it even while it is blocked on a full queue.
    let mut events = Vec::new();
    while backend.poll().is_pending() {
        assert_eq!(h.sweep.state(), SweepState::Sweeping);
        assert_pending!(api.poll());
        assert_pending!(route.poll());
        events.push(h.events.try_recv().expect("sweep must queue an event before waiting"));
    }
    assert_eq!(h.sweep.state(), SweepState::Ready);

    assert!(api.is_woken());
    assert_ready!(api.poll());
    assert_ready!(route.poll());
    while let Some(event) = h.events.try_recv() {
        events.push(event);
    }
    assert_eq!(
        summary(&events),
        vec![
            (EventKind::Create, id("api1"), vec!["API Definition"]),
            (EventKind::Create, id("api2"), vec!["API Definition"]),
            (EventKind::Create, id("api3"), vec!["API Definition"]),
        ]
    );
}

#[tokio::test]
async fn backend_settings_resolved() {
    let mut h = Harness::<ApiState>::new();
    let mut backend = mk_backend("backend", 8443);
    backend.spec.protocol = "https".to_string();
    backend.spec.tls = Some(backend::TlsConfig {
        secret_ref: Some(backend::RefConfig {
            name: "backend-tls".to_string(),
            key: "ca.crt".to_string(),
        }),
        allowed_sans: vec!["backend.ns.svc".to_string()],
        ..Default::default()
    });
    backend.spec.security = Some(backend::SecurityConfig {
        basic: Some(backend::BasicSecurityConfig {
            secret_ref: backend::SecretRef {
                name: "backend-creds".to_string(),
                username_key: "username".to_string(),
                password_key: "password".to_string(),
            },
        }),
    });
    backend.spec.retry = Some(backend::RetryConfig {
        count: 3,
        base_interval_millis: 100,
        status_codes: vec![503],
    });
    backend.spec.timeout = Some(backend::Timeout {
        max_route_timeout_seconds: 60,
        route_timeout_seconds: 30,
        route_idle_timeout_seconds: 300,
    });
    h.apply(backend);
    h.apply(orders_route(None));
    h.apply(mk_api("api1", 1, &["prod-route"]));
    h.apply(mk_secret("backend-tls", &[("ca.crt", "-----BEGIN CERTIFICATE-----")]));

    // The credentials are not stored yet.
    assert_eq!(summary(&h.settle().await), vec![]);

    h.apply(mk_secret(
        "backend-creds",
        &[("username", "admin"), ("password", "s3cret")],
    ));
    let events = h.settle().await;
    assert_eq!(
        summary(&events),
        vec![(EventKind::Create, id("api1"), vec!["API Definition"])]
    );
    let resolved = &events[0].state.backends[&id("backend")];
    assert_eq!(
        resolved.tls.as_ref().map(|tls| tls.certificate.as_str()),
        Some("-----BEGIN CERTIFICATE-----")
    );
    assert_eq!(
        resolved.security,
        Some(BackendSecurity::Basic {
            username: "admin".to_string(),
            password: "s3cret".to_string(),
        })
    );
    assert_eq!(
        resolved.retry,
        Some(Retry {
            count: 3,
            base_interval_millis: 100,
            status_codes: vec![503],
        })
    );
    assert_eq!(
        resolved.timeout,
        Some(Timeout {
            max_route_timeout_seconds: 60,
            route_timeout_seconds: 30,
            route_idle_timeout_seconds: 300,
        })
    );
    assert!(resolved.circuit_breaker.is_none());

    // Rotating a referenced secret updates the API.
    h.apply(mk_secret(
        "backend-creds",
        &[("username", "admin"), ("password", "rotated")],
    ));
    assert_eq!(
        summary(&h.settle().await),
        vec![(EventKind::Update, id("api1"), vec!["Backend Properties"])]
    );

    // Unreferenced secrets are ignored.
    h.apply(mk_secret("unrelated", &[("token", "x")]));
    assert_eq!(summary(&h.settle().await), vec![]);
}

#[tokio::test]
async fn backend_certificate_from_config_map() {
    let mut h = Harness::<ApiState>::new();
    let mut backend = mk_backend("backend", 8443);
    backend.spec.tls = Some(backend::TlsConfig {
        config_map_ref: Some(backend::RefConfig {
            name: "backend-ca".to_string(),
            key: "ca.crt".to_string(),
        }),
        ..Default::default()
    });
    h.apply(backend);
    h.apply(orders_route(None));
    h.apply(mk_api("api1", 1, &["prod-route"]));

    // A config map without the key leaves the certificate unresolved.
    h.apply(mk_config_map("backend-ca", &[("other", "x")]));
    assert_eq!(summary(&h.settle().await), vec![]);

    h.apply(mk_config_map("backend-ca", &[("ca.crt", "cert-v1")]));
    let events = h.settle().await;
    assert_eq!(
        summary(&events),
        vec![(EventKind::Create, id("api1"), vec!["API Definition"])]
    );
    assert_eq!(
        events[0].state.backends[&id("backend")]
            .tls
            .as_ref()
            .map(|tls| tls.certificate.as_str()),
        Some("cert-v1")
    );

    IndexNamespacedResource::<k8s::ConfigMap>::delete(
        &mut *h.store.write(),
        NS.to_string(),
        "backend-ca".to_string(),
    );
    // The last resolved state stays in effect.
    assert_eq!(summary(&h.settle().await), vec![]);
    assert!(h.cached(&id("api1")).is_some());
}
