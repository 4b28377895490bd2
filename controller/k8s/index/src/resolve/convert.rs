//! Conversions from watched resources into resolution values.

use super::{require, ResolveError};
use crate::store::{Indexed, Kind, Store};
use apigw_controller_core::{
    policy,
    state::{
        BackendSecurity, BackendService, BackendTls, CircuitBreaker, HealthCheck,
        InterceptorService, PathMatch, PolicyKind, PolicyRef, ResolvedBackend, Retry, Route,
        RouteRule, Timeout, TokenIssuer, Versioned, WeightedBackend,
    },
    PolicyAttachment, ResourceId, Scope,
};
use apigw_controller_k8s_api::{
    self as k8s, api_policy, authentication, backend, gateway, rate_limit_policy, NamespacedTargetRef,
    ResourceExt, GROUP,
};
use chrono::{DateTime, Utc};

const BACKEND_KIND: &str = "Backend";

/// Wraps a resolved value with its resource's version metadata.
pub(super) fn versioned<T: Indexed, S>(resource: &T, id: ResourceId, spec: S) -> Versioned<S> {
    Versioned {
        id,
        uid: resource.uid(),
        generation: resource.meta().generation.unwrap_or_default(),
        spec,
    }
}

pub(super) fn id_of<T: Indexed>(resource: &T) -> ResourceId {
    ResourceId::new(resource.namespace().unwrap_or_default(), resource.name_any())
}

fn creation_timestamp<T: Indexed>(resource: &T) -> DateTime<Utc> {
    resource
        .meta()
        .creation_timestamp
        .as_ref()
        .map(|t| t.0)
        .unwrap_or_default()
}

/// Resolves the identity a policy targets.
///
/// A policy may only target resources in its own namespace.
pub(super) fn policy_target<T: Indexed>(
    policy: &T,
    target_ref: &NamespacedTargetRef,
) -> Result<ResourceId, ResolveError> {
    let id = id_of(policy);
    let target_namespace = target_ref.namespace_or(&id.namespace);
    if target_namespace != id.namespace {
        return Err(ResolveError::NamespaceMismatch {
            kind: T::KIND,
            target_namespace: target_namespace.to_string(),
            id,
        });
    }
    Ok(ResourceId::new(id.namespace.clone(), target_ref.name.clone()))
}

/// Builds a versioned attachment from a policy's layers.
pub(super) fn attachment<T: Indexed, S, P>(
    resource: &T,
    target: ResourceId,
    scope: Scope,
    default: Option<&S>,
    overrides: Option<&S>,
    convert: impl Fn(&S) -> P,
) -> Versioned<PolicyAttachment<P>> {
    let id = id_of(resource);
    let attachment = PolicyAttachment {
        id: id.clone(),
        target,
        scope,
        creation_timestamp: creation_timestamp(resource),
        default: default.map(&convert),
        overrides: overrides.map(&convert),
    };
    versioned(resource, id, attachment)
}

// === policies ===

pub(super) fn rate_limit(spec: &rate_limit_policy::RateLimit) -> policy::RateLimit {
    fn limit(l: &rate_limit_policy::Limit) -> policy::Limit {
        policy::Limit {
            requests_per_unit: l.requests_per_unit,
            unit: l.unit.clone(),
        }
    }

    policy::RateLimit {
        api: spec.api.as_ref().map(limit),
        custom: spec.custom.as_ref().map(|c| policy::CustomLimit {
            key: c.key.clone(),
            value: c.value.clone(),
            limit: limit(&c.rate_limit),
        }),
    }
}

pub(super) fn authentication(spec: &authentication::AuthSpec) -> policy::Authentication {
    let types = spec.auth_types.as_ref();
    policy::Authentication {
        disabled: spec.disabled.unwrap_or(false),
        jwt: types.and_then(|t| t.jwt.as_ref()).map(|jwt| policy::Jwt {
            disabled: jwt.disabled,
            header: jwt.header.clone(),
            send_token_to_upstream: jwt.send_token_to_upstream,
            audience: jwt.audience.clone(),
        }),
        api_key: types
            .and_then(|t| t.api_key.as_ref())
            .map(|key| policy::ApiKey {
                header: key.header.clone(),
                query_param: key.query_param.clone(),
                send_token_to_upstream: key.send_token_to_upstream,
            }),
        mutual_ssl: types
            .and_then(|t| t.mutual_ssl.as_ref())
            .map(|mtls| policy::MutualSsl {
                disabled: mtls.disabled,
                required: mtls.required.clone(),
                certificates: mtls.certificates_inline.clone(),
            }),
    }
}

pub(super) fn api_policy(spec: &api_policy::PolicySpec) -> policy::ApiPolicy {
    let names = |refs: &[api_policy::LocalRef]| refs.iter().map(|r| r.name.clone()).collect();
    policy::ApiPolicy {
        request_interceptors: names(&spec.request_interceptors),
        response_interceptors: names(&spec.response_interceptors),
        backend_jwt: spec
            .backend_jwt_policy
            .as_ref()
            .map(|r| policy::BackendJwtRef {
                name: r.name.clone(),
            }),
        cors: spec.cors_policy.as_ref().map(|cors| policy::Cors {
            enabled: cors.enabled,
            allow_credentials: cors.access_control_allow_credentials,
            allow_headers: cors.access_control_allow_headers.clone(),
            allow_methods: cors.access_control_allow_methods.clone(),
            allow_origins: cors.access_control_allow_origins.clone(),
            expose_headers: cors.access_control_expose_headers.clone(),
            max_age: cors.access_control_max_age.unwrap_or_default(),
        }),
        subscription_validation: spec.subscription_validation,
    }
}

// === dependencies ===

/// Resolves a backend, reading its certificate and credentials from the store.
pub(super) fn backend(
    store: &Store,
    id: &ResourceId,
    backend: &k8s::Backend,
) -> Result<ResolvedBackend, ResolveError> {
    let spec = &backend.spec;
    let tls = spec
        .tls
        .as_ref()
        .map(|tls| backend_tls(store, id, tls))
        .transpose()?;
    let security = match spec.security.as_ref().and_then(|s| s.basic.as_ref()) {
        Some(basic) => {
            let secret = &basic.secret_ref;
            Some(BackendSecurity::Basic {
                username: secret_value(store, id, &secret.name, &secret.username_key)?,
                password: secret_value(store, id, &secret.name, &secret.password_key)?,
            })
        }
        None => None,
    };

    Ok(ResolvedBackend {
        services: spec
            .services
            .iter()
            .map(|s| BackendService {
                host: s.host.clone(),
                port: s.port,
            })
            .collect(),
        protocol: spec.protocol.clone(),
        base_path: spec.base_path.clone(),
        tls,
        security,
        circuit_breaker: spec.circuit_breaker.as_ref().map(|cb| CircuitBreaker {
            max_connections: cb.max_connections,
            max_pending_requests: cb.max_pending_requests,
            max_requests: cb.max_requests,
            max_retries: cb.max_retries,
            max_connection_pools: cb.max_connection_pools,
        }),
        timeout: spec.timeout.as_ref().map(|t| Timeout {
            max_route_timeout_seconds: t.max_route_timeout_seconds,
            route_timeout_seconds: t.route_timeout_seconds,
            route_idle_timeout_seconds: t.route_idle_timeout_seconds,
        }),
        retry: spec.retry.as_ref().map(|r| Retry {
            count: r.count,
            base_interval_millis: r.base_interval_millis,
            status_codes: r.status_codes.clone(),
        }),
        health_check: spec.health_check.as_ref().map(|hc| HealthCheck {
            timeout: hc.timeout,
            interval: hc.interval,
            unhealthy_threshold: hc.unhealthy_threshold,
            healthy_threshold: hc.healthy_threshold,
        }),
    })
}

/// An inline certificate takes precedence over a secret, which takes precedence over a config
/// map.
fn backend_tls(
    store: &Store,
    id: &ResourceId,
    tls: &backend::TlsConfig,
) -> Result<BackendTls, ResolveError> {
    let certificate = match (&tls.certificate_inline, &tls.secret_ref, &tls.config_map_ref) {
        (Some(inline), _, _) if !inline.is_empty() => inline.clone(),
        (_, Some(secret), _) => secret_value(store, id, &secret.name, &secret.key)?,
        (_, None, Some(config_map)) => {
            let config_map_id = ResourceId::new(id.namespace.clone(), config_map.name.clone());
            let resource = require::<k8s::ConfigMap>(store, config_map_id)?;
            resource
                .data
                .as_ref()
                .and_then(|data| data.get(&config_map.key))
                .cloned()
                .ok_or_else(|| {
                    invalid_backend(
                        id,
                        format!("ConfigMap {} has no key {}", config_map.name, config_map.key),
                    )
                })?
        }
        _ => String::new(),
    };
    if certificate.is_empty() {
        return Err(invalid_backend(id, "TLS certificate is empty".to_string()));
    }
    Ok(BackendTls {
        certificate,
        allowed_sans: tls.allowed_sans.clone(),
    })
}

fn secret_value(
    store: &Store,
    id: &ResourceId,
    name: &str,
    key: &str,
) -> Result<String, ResolveError> {
    let secret = require::<k8s::Secret>(store, ResourceId::new(id.namespace.clone(), name))?;
    let value = secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .ok_or_else(|| invalid_backend(id, format!("Secret {name} has no key {key}")))?;
    String::from_utf8(value.0.clone())
        .map_err(|_| invalid_backend(id, format!("Secret {name} key {key} is not UTF-8")))
}

fn invalid_backend(id: &ResourceId, reason: String) -> ResolveError {
    ResolveError::InvalidDefinition {
        kind: Kind::Backend,
        id: id.clone(),
        reason,
    }
}

pub(super) fn interceptor(namespace: &str, spec: &k8s::InterceptorServiceSpec) -> InterceptorService {
    InterceptorService {
        backend: ResourceId::new(namespace, spec.backend_ref.name.clone()),
        includes: spec.includes.clone(),
    }
}

pub(super) fn backend_jwt(spec: &k8s::BackendJwtSpec) -> policy::BackendJwt {
    policy::BackendJwt {
        encoding: spec.encoding.clone(),
        signing_algorithm: spec.signing_algorithm.clone(),
        header: spec.header.clone(),
        token_ttl: spec.token_ttl,
        custom_claims: spec.custom_claims.clone(),
    }
}

pub(super) fn token_issuer(spec: &k8s::TokenIssuerSpec) -> TokenIssuer {
    let validation = spec.signature_validation.as_ref();
    TokenIssuer {
        name: spec.name.clone(),
        organization: spec.organization.clone(),
        issuer: spec.issuer.clone(),
        consumer_key_claim: spec.consumer_key_claim.clone(),
        scopes_claim: spec.scopes_claim.clone(),
        jwks_url: validation.and_then(|v| v.jwks_url.clone()),
        certificate: validation.and_then(|v| v.certificate_inline.clone()),
        claim_mappings: spec.claim_mappings.clone(),
        environments: spec.environments.clone(),
    }
}

// === routes ===

/// Maps an extension filter to the policy it references, if it names a policy kind.
pub(super) fn policy_kind(group: &str, kind: &str) -> Option<PolicyKind> {
    if group != GROUP {
        return None;
    }
    match kind {
        "Authentication" => Some(PolicyKind::Authentication),
        "RateLimitPolicy" => Some(PolicyKind::RateLimit),
        "APIPolicy" => Some(PolicyKind::ApiPolicy),
        _ => None,
    }
}

pub(super) fn route(route: &gateway::HttpRoute) -> Result<Route, ResolveError> {
    let id = id_of(route);
    let rules = route
        .spec
        .rules
        .iter()
        .flatten()
        .map(|rule| route_rule(&id, rule))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Route {
        hostnames: route.spec.hostnames.clone().unwrap_or_default(),
        rules,
    })
}

fn route_rule(id: &ResourceId, rule: &gateway::HttpRouteRule) -> Result<RouteRule, ResolveError> {
    let matches = rule
        .matches
        .iter()
        .flatten()
        .filter_map(|m| m.path.as_ref())
        .map(|path| match path {
            gateway::HttpPathMatch::Exact { value } => PathMatch::Exact(value.clone()),
            gateway::HttpPathMatch::PathPrefix { value } => PathMatch::Prefix(value.clone()),
            gateway::HttpPathMatch::RegularExpression { value } => PathMatch::Regex(value.clone()),
        })
        .collect();

    let policies = rule
        .filters
        .iter()
        .flatten()
        .filter_map(|filter| match filter {
            gateway::HttpRouteFilter::ExtensionRef { extension_ref } => {
                let kind = policy_kind(&extension_ref.group, &extension_ref.kind)?;
                Some(PolicyRef {
                    kind,
                    id: ResourceId::new(id.namespace.clone(), extension_ref.name.clone()),
                })
            }
            _ => None,
        })
        .collect();

    let backends = rule
        .backend_refs
        .iter()
        .flatten()
        .filter_map(|b| b.backend_ref.as_ref())
        .map(|backend| {
            let reference = &backend.inner;
            if reference.kind.as_deref() != Some(BACKEND_KIND) {
                return Err(ResolveError::InvalidTarget {
                    kind: Kind::HttpRoute,
                    id: id.clone(),
                    reason: format!(
                        "backend {} must be a {BACKEND_KIND}",
                        reference.name
                    ),
                });
            }
            let namespace = reference.namespace.as_deref().unwrap_or(&id.namespace);
            Ok(WeightedBackend {
                id: ResourceId::new(namespace, reference.name.clone()),
                weight: backend.weight.unwrap_or(1),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RouteRule {
        matches,
        policies,
        backends,
    })
}
