/// An upstream service that routes and interceptors forward requests to.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(group = "dp.apigw.io", version = "v1alpha1", kind = "Backend", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct BackendSpec {
    #[serde(default)]
    pub services: Vec<Service>,
    /// One of `http`, `https`, `ws`, `wss`.
    pub protocol: String,
    #[serde(default)]
    pub base_path: String,
    pub tls: Option<TlsConfig>,
    pub security: Option<SecurityConfig>,
    pub circuit_breaker: Option<CircuitBreaker>,
    pub timeout: Option<Timeout>,
    pub retry: Option<RetryConfig>,
    pub health_check: Option<HealthCheck>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct Service {
    pub host: String,
    pub port: u16,
}

/// The certificate is taken from the first of the inline value, the secret and the config map
/// that is set.
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    pub certificate_inline: Option<String>,
    pub secret_ref: Option<RefConfig>,
    pub config_map_ref: Option<RefConfig>,
    #[serde(default, rename = "allowedSANs")]
    pub allowed_sans: Vec<String>,
}

/// A key of a Secret or ConfigMap in the backend's namespace.
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct RefConfig {
    pub name: String,
    pub key: String,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct SecurityConfig {
    pub basic: Option<BasicSecurityConfig>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BasicSecurityConfig {
    pub secret_ref: SecretRef,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
    pub username_key: String,
    pub password_key: String,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreaker {
    pub max_connections: u32,
    pub max_pending_requests: u32,
    pub max_requests: u32,
    pub max_retries: u32,
    pub max_connection_pools: u32,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Timeout {
    pub max_route_timeout_seconds: u32,
    pub route_timeout_seconds: u32,
    pub route_idle_timeout_seconds: u32,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    pub count: u32,
    pub base_interval_millis: u32,
    #[serde(default)]
    pub status_codes: Vec<u32>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    #[serde(default)]
    pub timeout: u32,
    #[serde(default)]
    pub interval: u32,
    #[serde(default)]
    pub unhealthy_threshold: u32,
    #[serde(default)]
    pub healthy_threshold: u32,
}

impl BackendSpec {
    /// Names of the Secrets the backend reads.
    pub fn secret_names(&self) -> impl Iterator<Item = &str> {
        let tls = self
            .tls
            .as_ref()
            .and_then(|tls| tls.secret_ref.as_ref())
            .map(|r| r.name.as_str());
        let basic = self
            .security
            .as_ref()
            .and_then(|s| s.basic.as_ref())
            .map(|b| b.secret_ref.name.as_str());
        tls.into_iter().chain(basic)
    }

    /// Names of the ConfigMaps the backend reads.
    pub fn config_map_names(&self) -> impl Iterator<Item = &str> {
        self.tls
            .as_ref()
            .and_then(|tls| tls.config_map_ref.as_ref())
            .map(|r| r.name.as_str())
            .into_iter()
    }
}
