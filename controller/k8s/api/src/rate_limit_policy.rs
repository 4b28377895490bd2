use super::NamespacedTargetRef;

/// Limits the request rate of an API, a resource or, with custom descriptors, a gateway.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "dp.apigw.io",
    version = "v1alpha1",
    kind = "RateLimitPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicySpec {
    pub target_ref: NamespacedTargetRef,
    pub default: Option<RateLimit>,
    #[serde(rename = "override")]
    pub overrides: Option<RateLimit>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub api: Option<Limit>,
    pub custom: Option<CustomLimit>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Limit {
    pub requests_per_unit: u32,
    /// One of `Minute`, `Hour`, `Day`.
    pub unit: String,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomLimit {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub rate_limit: Limit,
}
