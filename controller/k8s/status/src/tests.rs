
use crate::{Current, Error, StatusClient, Target, Update};
use ahash::AHashMap as HashMap;
use apigw_controller_core::{Family, ResourceId};
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;

fn target(family: Family, name: &str) -> Target {
    Target {
        family,
        id: ResourceId::new("ns", name),
    }
}

/// An update that sets the status to a fixed value.
fn set_status(target: Target, status: Value) -> Update {
    Update::new(target, move |_| Ok(status.clone()))
}

/// An in-memory status client enforcing resource versions.
#[derive(Debug, Default)]
struct FakeClient {
    resources: Mutex<HashMap<Target, Current>>,
    /// Number of upcoming patches that fail as if the resource were concurrently modified.
    conflicts: Mutex<u32>,
    /// Makes every fetch hang.
    stalled: bool,
    patches: Mutex<Vec<(Target, Value)>>,
}

impl FakeClient {
    fn with(targets: impl IntoIterator<Item = Target>) -> Self {
        let client = Self::default();
        for target in targets {
            client.resources.lock().insert(
                target,
                Current {
                    resource_version: Some("1".to_string()),
                    generation: Some(1),
                    status: Value::Null,
                },
            );
        }
        client
    }

    fn status(&self, target: &Target) -> Option<Value> {
        self.resources.lock().get(target).map(|c| c.status.clone())
    }

    fn bump(current: &mut Current) {
        let version = current
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        current.resource_version = Some((version + 1).to_string());
    }
}

#[async_trait::async_trait]
impl StatusClient for FakeClient {
    async fn fetch(&self, target: &Target) -> Result<Option<Current>, Error> {
        if self.stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(self.resources.lock().get(target).cloned())
    }

    async fn patch_status(
        &self,
        target: &Target,
        resource_version: Option<&str>,
        status: Value,
    ) -> Result<(), Error> {
        let mut resources = self.resources.lock();
        let current = resources.get_mut(target).ok_or(Error::NotFound)?;
        {
            let mut conflicts = self.conflicts.lock();
            if *conflicts > 0 {
                *conflicts -= 1;
                // Another writer got there first.
                Self::bump(current);
                return Err(Error::Conflict);
            }
        }
        if current.resource_version.as_deref() != resource_version {
            return Err(Error::Conflict);
        }
        current.status = status.clone();
        Self::bump(current);
        self.patches.lock().push((target.clone(), status));
        Ok(())
    }
}
