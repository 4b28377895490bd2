use super::NamespacedTargetRef;
use std::collections::BTreeMap;

/// An identity provider whose tokens a gateway accepts.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "dp.apigw.io",
    version = "v1alpha1",
    kind = "TokenIssuer",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TokenIssuerSpec {
    pub target_ref: NamespacedTargetRef,
    pub name: String,
    #[serde(default)]
    pub organization: String,
    pub issuer: String,
    #[serde(default)]
    pub consumer_key_claim: String,
    #[serde(default)]
    pub scopes_claim: String,
    pub signature_validation: Option<SignatureValidation>,
    #[serde(default)]
    pub claim_mappings: BTreeMap<String, String>,
    #[serde(default)]
    pub environments: Vec<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignatureValidation {
    pub jwks_url: Option<String>,
    pub certificate_inline: Option<String>,
}
