use super::NamespacedTargetRef;

/// Configures client authentication for an API or for the resources of a route.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "dp.apigw.io",
    version = "v1alpha1",
    kind = "Authentication",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    pub target_ref: NamespacedTargetRef,
    pub default: Option<AuthSpec>,
    #[serde(rename = "override")]
    pub overrides: Option<AuthSpec>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSpec {
    pub disabled: Option<bool>,
    pub auth_types: Option<AuthTypes>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthTypes {
    pub jwt: Option<Jwt>,
    pub api_key: Option<ApiKey>,
    #[serde(rename = "mtls")]
    pub mutual_ssl: Option<MutualSsl>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Jwt {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub send_token_to_upstream: bool,
    #[serde(default)]
    pub audience: Vec<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub query_param: String,
    #[serde(default)]
    pub send_token_to_upstream: bool,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MutualSsl {
    #[serde(default)]
    pub disabled: bool,
    /// Either `mandatory` or `optional`.
    pub required: String,
    #[serde(default)]
    pub certificates_inline: Vec<String>,
}
