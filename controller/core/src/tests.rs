mod merge;

use crate::{
    policy::{ApiPolicy, Authentication, BackendJwt, Limit, RateLimit},
    state::{
        ApiDefinition, ApiState, BackendService, Dependents, InterceptorService, PathMatch,
        PolicyKind, PolicyRef, ResolvedBackend, Route, RouteRule, Versioned, WeightedBackend,
    },
    PolicyAttachment, ResourceId, Scope,
};
use chrono::{DateTime, Utc};

const NS: &str = "ns";

fn id(name: &str) -> ResourceId {
    ResourceId::new(NS, name)
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("timestamp must be valid")
}

fn attachment<T>(
    name: &str,
    target: &str,
    scope: Scope,
    default: Option<T>,
    overrides: Option<T>,
) -> Versioned<PolicyAttachment<T>> {
    Versioned::new(
        id(name),
        PolicyAttachment {
            id: id(name),
            target: id(target),
            scope,
            creation_timestamp: at(0),
            default,
            overrides,
        },
    )
    .with_uid(format!("{name}-uid"))
    .with_generation(1)
}

fn requests(requests_per_unit: u32) -> RateLimit {
    RateLimit {
        api: Some(Limit {
            requests_per_unit,
            unit: "Minute".to_string(),
        }),
        custom: None,
    }
}

fn route(name: &str, path: &str, policies: Vec<PolicyRef>) -> Versioned<Route> {
    Versioned::new(
        id(name),
        Route {
            hostnames: vec!["api.example.com".to_string()],
            rules: vec![RouteRule {
                matches: vec![PathMatch::Prefix(path.to_string())],
                policies,
                backends: vec![WeightedBackend {
                    id: id("backend"),
                    weight: 1,
                }],
            }],
        },
    )
    .with_uid(format!("{name}-uid"))
    .with_generation(1)
}

fn policy_ref(kind: PolicyKind, name: &str) -> PolicyRef {
    PolicyRef { kind, id: id(name) }
}

fn definition(name: &str) -> Versioned<ApiDefinition> {
    Versioned::new(
        id(name),
        ApiDefinition {
            api_name: name.to_string(),
            api_version: "v1".to_string(),
            organization: "default".to_string(),
            base_path: format!("/{name}/v1"),
            api_type: "REST".to_string(),
            production_route_refs: vec!["prod-route".to_string()],
            sandbox_route_refs: vec!["sand-route".to_string()],
        },
    )
    .with_uid(format!("{name}-uid"))
    .with_generation(1)
}

fn backend(port: u16) -> ResolvedBackend {
    ResolvedBackend {
        services: vec![BackendService {
            host: "backend.ns.svc".to_string(),
            port,
        }],
        protocol: "http".to_string(),
        base_path: String::new(),
        ..Default::default()
    }
}

/// An API with every dependent group populated.
fn populated_api() -> ApiState {
    let mut state = ApiState::new(definition("api1"));
    state.production_routes = Some(Dependents::from_iter([route(
        "prod-route",
        "/orders",
        vec![
            policy_ref(PolicyKind::Authentication, "res-auth"),
            policy_ref(PolicyKind::RateLimit, "res-rl"),
            policy_ref(PolicyKind::ApiPolicy, "res-policy"),
        ],
    )]));
    state.sandbox_routes = Some(Dependents::from_iter([route(
        "sand-route",
        "/orders",
        vec![],
    )]));
    state.authentications = Dependents::from_iter([attachment(
        "auth",
        "api1",
        Scope::Api,
        Some(Authentication::default()),
        None,
    )]);
    state.resource_authentications = Dependents::from_iter([attachment(
        "res-auth",
        "prod-route",
        Scope::Resource,
        Some(Authentication {
            disabled: true,
            ..Default::default()
        }),
        None,
    )]);
    state.rate_limit_policies = Dependents::from_iter([attachment(
        "rl",
        "api1",
        Scope::Api,
        Some(requests(100)),
        None,
    )]);
    state.resource_rate_limit_policies = Dependents::from_iter([attachment(
        "res-rl",
        "prod-route",
        Scope::Resource,
        Some(requests(10)),
        None,
    )]);
    state.api_policies = Dependents::from_iter([attachment(
        "policy",
        "api1",
        Scope::Api,
        Some(ApiPolicy {
            request_interceptors: vec!["interceptor".to_string()],
            subscription_validation: true,
            ..Default::default()
        }),
        None,
    )]);
    state.resource_api_policies = Dependents::from_iter([attachment(
        "res-policy",
        "prod-route",
        Scope::Resource,
        None,
        Some(ApiPolicy {
            response_interceptors: vec!["interceptor".to_string()],
            ..Default::default()
        }),
    )]);
    state.interceptor_services = Dependents::from_iter([Versioned::new(
        id("interceptor"),
        InterceptorService {
            backend: id("interceptor-backend"),
            includes: vec!["request_headers".to_string()],
        },
    )
    .with_generation(1)]);
    state.backend_jwts = Dependents::from_iter([Versioned::new(
        id("jwt"),
        BackendJwt {
            encoding: "base64".to_string(),
            ..Default::default()
        },
    )
    .with_generation(1)]);
    state.backends.insert(id("backend"), backend(8080));
    state.compute_effective();
    state
}
