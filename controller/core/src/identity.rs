use std::fmt;

/// Identifies a namespaced resource.
///
/// Ordering is lexicographic on `(namespace, name)`. Where a string ordering is required (e.g.
/// when breaking ties between policies), the `namespace/name` form is compared instead.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl std::str::FromStr for ResourceId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(ns, name))
            }
            _ => anyhow::bail!("invalid resource id: {s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        let id = ResourceId::new("ns", "api-1");
        assert_eq!(id.to_string(), "ns/api-1");
        assert_eq!("ns/api-1".parse::<ResourceId>().unwrap(), id);
        assert!("ns".parse::<ResourceId>().is_err());
        assert!("/api".parse::<ResourceId>().is_err());
        assert!("a/b/c".parse::<ResourceId>().is_err());
    }

    #[test]
    fn orders_by_namespace_then_name() {
        let mut ids = vec![
            ResourceId::new("b", "a"),
            ResourceId::new("a", "z"),
            ResourceId::new("a", "b"),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                ResourceId::new("a", "b"),
                ResourceId::new("a", "z"),
                ResourceId::new("b", "a"),
            ]
        );
    }
}
