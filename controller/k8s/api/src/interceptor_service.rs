use super::api_policy::LocalRef;

/// A service invoked to inspect or transform requests and responses.
#[derive(
    Clone, Debug, Default, kube::CustomResource, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
#[kube(
    group = "dp.apigw.io",
    version = "v1alpha1",
    kind = "InterceptorService",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct InterceptorServiceSpec {
    /// The Backend hosting the interceptor.
    pub backend_ref: LocalRef,
    #[serde(default)]
    pub includes: Vec<String>,
}
