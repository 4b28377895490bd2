use apigw_controller_core::{Family, ResourceId};
use apigw_controller_k8s_api::{self as k8s, gateway};
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams};
use std::fmt;

/// The resource whose status is written.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    pub family: Family,
    pub id: ResourceId,
}

/// A freshly fetched copy of a resource's status.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Current {
    pub resource_version: Option<String>,
    pub generation: Option<i64>,
    /// `Null` when the resource has no status yet.
    pub status: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the resource was modified concurrently")]
    Conflict,

    #[error("the server could not complete the request: {0}")]
    ServerTimeout(String),

    #[error("the resource no longer exists")]
    NotFound,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reads and writes the status subresource of target resources.
#[async_trait::async_trait]
pub trait StatusClient: Send + Sync + 'static {
    /// Fetches the current resource. Returns `None` if it does not exist.
    async fn fetch(&self, target: &Target) -> Result<Option<Current>, Error>;

    /// Replaces the status, failing with [`Error::Conflict`] if the resource was modified since
    /// `resource_version` was observed.
    async fn patch_status(
        &self,
        target: &Target,
        resource_version: Option<&str>,
        status: serde_json::Value,
    ) -> Result<(), Error>;
}

/// A [`StatusClient`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStatusClient {
    client: kube::Client,
    params: PatchParams,
}

// === impl Target ===

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.family, self.id)
    }
}

// === impl Error ===

impl Error {
    /// Conflicts and transient server failures may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict | Self::ServerTimeout(_))
    }
}

impl From<kube::Error> for Error {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(rsp) if rsp.code == 409 => Self::Conflict,
            kube::Error::Api(rsp) if rsp.code == 404 => Self::NotFound,
            kube::Error::Api(rsp)
                if rsp.code == 429
                    || rsp.code >= 500
                    || rsp.reason == "ServerTimeout"
                    || rsp.reason == "Timeout" =>
            {
                Self::ServerTimeout(rsp.message)
            }
            error => Self::Other(error.into()),
        }
    }
}

// === impl KubeStatusClient ===

impl KubeStatusClient {
    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            params: PatchParams::apply(crate::FIELD_MANAGER),
        }
    }

    fn api(&self, target: &Target) -> Api<DynamicObject> {
        let resource = match target.family {
            Family::Api => ApiResource::erase::<k8s::Api>(&()),
            Family::Gateway => ApiResource::erase::<gateway::Gateway>(&()),
        };
        Api::namespaced_with(self.client.clone(), &target.id.namespace, &resource)
    }
}

#[async_trait::async_trait]
impl StatusClient for KubeStatusClient {
    async fn fetch(&self, target: &Target) -> Result<Option<Current>, Error> {
        let Some(obj) = self.api(target).get_opt(&target.id.name).await? else {
            return Ok(None);
        };
        Ok(Some(Current {
            resource_version: obj.metadata.resource_version,
            generation: obj.metadata.generation,
            status: obj
                .data
                .get("status")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        }))
    }

    async fn patch_status(
        &self,
        target: &Target,
        resource_version: Option<&str>,
        status: serde_json::Value,
    ) -> Result<(), Error> {
        // The resource version makes the merge patch conditional on the fetched copy.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": resource_version },
            "status": status,
        });
        self.api(target)
            .patch_status(&target.id.name, &self.params, &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}
