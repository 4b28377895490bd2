use std::collections::BTreeMap;

pub type BackendJwt = BackendJWT;

/// Configures the token the gateway issues to backends.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "dp.apigw.io",
    version = "v1alpha1",
    kind = "BackendJWT",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BackendJwtSpec {
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub signing_algorithm: String,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub token_ttl: u32,
    #[serde(default)]
    pub custom_claims: BTreeMap<String, String>,
}
