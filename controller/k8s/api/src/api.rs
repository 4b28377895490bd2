use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// The `API` resource, named for its kind.
pub type Api = API;

/// Describes an API exposed through the gateway.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "dp.apigw.io",
    version = "v1alpha1",
    kind = "API",
    status = "ApiStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpec {
    pub api_name: String,
    pub api_version: String,
    #[serde(default)]
    pub organization: String,
    pub base_path: String,
    #[serde(default)]
    pub api_type: String,
    #[serde(default)]
    pub production: Vec<EnvConfig>,
    #[serde(default)]
    pub sandbox: Vec<EnvConfig>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvConfig {
    /// Names of HTTPRoutes in the API's namespace.
    pub route_refs: Vec<String>,
}

#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub deployment_status: Option<DeploymentStatus>,
}

#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatus {
    pub status: String,
    pub message: String,
    pub accepted: bool,
    pub transition_time: Option<Time>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
}

impl ApiSpec {
    pub fn route_refs(&self) -> impl Iterator<Item = &str> {
        self.production
            .iter()
            .chain(self.sandbox.iter())
            .flat_map(|env| env.route_refs.iter().map(String::as_str))
    }
}
