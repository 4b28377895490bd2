use super::NamespacedTargetRef;

pub type ApiPolicy = APIPolicy;

/// Configures request processing for an API, a resource or a gateway.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "dp.apigw.io",
    version = "v1alpha1",
    kind = "APIPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ApiPolicySpec {
    pub target_ref: NamespacedTargetRef,
    pub default: Option<PolicySpec>,
    #[serde(rename = "override")]
    pub overrides: Option<PolicySpec>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(default)]
    pub request_interceptors: Vec<LocalRef>,
    #[serde(default)]
    pub response_interceptors: Vec<LocalRef>,
    pub backend_jwt_policy: Option<LocalRef>,
    #[serde(rename = "cORSPolicy")]
    pub cors_policy: Option<CorsPolicy>,
    #[serde(default)]
    pub subscription_validation: bool,
}

/// Names a resource in the policy's namespace.
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
pub struct LocalRef {
    pub name: String,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CorsPolicy {
    pub enabled: bool,
    #[serde(default)]
    pub access_control_allow_credentials: bool,
    #[serde(default)]
    pub access_control_allow_headers: Vec<String>,
    #[serde(default)]
    pub access_control_allow_methods: Vec<String>,
    #[serde(default)]
    pub access_control_allow_origins: Vec<String>,
    #[serde(default)]
    pub access_control_expose_headers: Vec<String>,
    pub access_control_max_age: Option<u32>,
}

impl PolicySpec {
    /// Names of every interceptor service referenced by the policy.
    pub fn interceptor_names(&self) -> impl Iterator<Item = &str> {
        self.request_interceptors
            .iter()
            .chain(self.response_interceptors.iter())
            .map(|r| r.name.as_str())
    }
}

impl ApiPolicySpec {
    /// Both configuration layers of the policy.
    pub fn layers(&self) -> impl Iterator<Item = &PolicySpec> {
        self.default.iter().chain(self.overrides.iter())
    }
}
