use crate::ResourceId;
use std::{collections::BTreeMap, fmt};

/// A backend resolved to the endpoints and transport settings used to reach it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedBackend {
    pub services: Vec<BackendService>,
    pub protocol: String,
    pub base_path: String,
    pub tls: Option<BackendTls>,
    pub security: Option<BackendSecurity>,
    pub circuit_breaker: Option<CircuitBreaker>,
    pub timeout: Option<Timeout>,
    pub retry: Option<Retry>,
    pub health_check: Option<HealthCheck>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendService {
    pub host: String,
    pub port: u16,
}

/// TLS settings with the certificate read from wherever the backend keeps it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendTls {
    pub certificate: String,
    pub allowed_sans: Vec<String>,
}

/// Credentials presented to the backend.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendSecurity {
    Basic { username: String, password: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CircuitBreaker {
    pub max_connections: u32,
    pub max_pending_requests: u32,
    pub max_requests: u32,
    pub max_retries: u32,
    pub max_connection_pools: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Timeout {
    pub max_route_timeout_seconds: u32,
    pub route_timeout_seconds: u32,
    pub route_idle_timeout_seconds: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Retry {
    pub count: u32,
    pub base_interval_millis: u32,
    pub status_codes: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthCheck {
    pub timeout: u32,
    pub interval: u32,
    pub unhealthy_threshold: u32,
    pub healthy_threshold: u32,
}

/// A service invoked around the request or response flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterceptorService {
    pub backend: ResourceId,
    /// Parts of the exchange forwarded to the interceptor (e.g. `request_headers`).
    pub includes: Vec<String>,
}

/// An identity provider trusted by a gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenIssuer {
    pub name: String,
    pub organization: String,
    pub issuer: String,
    pub consumer_key_claim: String,
    pub scopes_claim: String,
    pub jwks_url: Option<String>,
    pub certificate: Option<String>,
    pub claim_mappings: BTreeMap<String, String>,
    pub environments: Vec<String>,
}

// === impl BackendSecurity ===

impl fmt::Debug for BackendSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}
