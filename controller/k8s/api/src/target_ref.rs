/// References the resource a policy is attached to.
#[derive(
    Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct NamespacedTargetRef {
    pub group: Option<String>,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl NamespacedTargetRef {
    pub fn from_resource<T>(resource: &T) -> Option<Self>
    where
        T: kube::Resource,
        T::DynamicType: Default,
    {
        let dt = Default::default();
        let group = match T::group(&dt) {
            g if (*g).is_empty() => None,
            g => Some(g.to_string()),
        };
        Some(Self {
            group,
            kind: T::kind(&dt).to_string(),
            name: resource.meta().name.clone()?,
            namespace: resource.meta().namespace.clone(),
        })
    }

    /// Returns the target ref kind, qualified by its group, if necessary.
    pub fn canonical_kind(&self) -> String {
        match self.group.as_deref() {
            Some(group) if !group.is_empty() => format!("{}.{group}", self.kind),
            _ => self.kind.clone(),
        }
    }

    /// Checks whether the target references the given resource type.
    ///
    /// An omitted group matches any group, so that `kind: API` may be written without one.
    pub fn targets_kind<T>(&self) -> bool
    where
        T: kube::Resource,
        T::DynamicType: Default,
    {
        let dt = Default::default();
        if !self.kind.eq_ignore_ascii_case(&T::kind(&dt)) {
            return false;
        }
        match self.group.as_deref() {
            None | Some("") => true,
            Some(group) => group.eq_ignore_ascii_case(&T::group(&dt)),
        }
    }

    /// The namespace of the target, defaulting to the policy's own.
    pub fn namespace_or<'a>(&'a self, local_ns: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(local_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{gateway::Gateway, Api};

    #[test]
    fn targets_api_kind() {
        let t = NamespacedTargetRef {
            group: None,
            kind: "API".to_string(),
            name: "api1".to_string(),
            namespace: None,
        };
        assert!(t.targets_kind::<Api>());
        assert!(!t.targets_kind::<Gateway>());
        assert_eq!(t.namespace_or("ns"), "ns");
        assert_eq!(t.canonical_kind(), "API");
    }

    #[test]
    fn targets_gateway_with_group() {
        let t = NamespacedTargetRef {
            group: Some("gateway.networking.k8s.io".to_string()),
            kind: "Gateway".to_string(),
            name: "default".to_string(),
            namespace: Some("apigw".to_string()),
        };
        assert!(t.targets_kind::<Gateway>());
        assert!(!t.targets_kind::<Api>());
        assert_eq!(t.namespace_or("ns"), "apigw");
        assert_eq!(t.canonical_kind(), "Gateway.gateway.networking.k8s.io");

        let wrong_group = NamespacedTargetRef {
            group: Some("dp.apigw.io".to_string()),
            ..t
        };
        assert!(!wrong_group.targets_kind::<Gateway>());
    }
}
