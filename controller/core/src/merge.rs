//! Layered policy resolution.
//!
//! A policy kind may be attached at two independently overridable scopes ("up", e.g. the API,
//! and "down", e.g. a single resource of the API), each carrying an optional default and an
//! optional override. [`select_effective`] folds those four layers into one value, with
//! precedence:
//!
//! ```text
//! up override > down override > down default > up default
//! ```
//!
//! Values are combined field by field: a set field of a higher-precedence layer wins, an unset
//! one falls through to the layer below. Nested structures are combined recursively.

use crate::ResourceId;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A configuration fragment that may be layered.
///
/// Implementations treat the type's zero value (`0`, `false`, `""`, an empty collection,
/// `None`) as "not set".
pub trait Merge: Clone {
    /// Returns true if no field of the value is set.
    fn is_unset(&self) -> bool;

    /// Combines `self` with a lower-precedence value, producing a new value.
    ///
    /// Set fields of `self` win; unset fields are taken from `lower`.
    fn merge(&self, lower: &Self) -> Self;
}

/// The scope at which a policy is attached to its target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Resource,
    Api,
    Gateway,
}

/// A policy object targeting a resource with default and/or override configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyAttachment<T> {
    pub id: ResourceId,
    pub target: ResourceId,
    pub scope: Scope,
    pub creation_timestamp: DateTime<Utc>,
    pub default: Option<T>,
    pub overrides: Option<T>,
}

/// Computes the effective value of four layered sources.
///
/// Sources that are absent or unset are ignored. Returns `None` when no source is set and
/// the single set source, unchanged, when only one is.
pub fn select_effective<T: Merge>(
    up_override: Option<&T>,
    up_default: Option<&T>,
    down_override: Option<&T>,
    down_default: Option<&T>,
) -> Option<T> {
    // Lowest precedence first.
    [up_default, down_default, down_override, up_override]
        .into_iter()
        .flatten()
        .filter(|layer| !layer.is_unset())
        .fold(None, |lower, higher| match lower {
            None => Some(higher.clone()),
            Some(lower) => Some(higher.merge(&lower)),
        })
}

/// Picks the authoritative attachment among several of the same kind targeting one resource.
///
/// The oldest attachment wins. When creation timestamps are identical, the attachment whose
/// `namespace/name` sorts last wins. The result does not depend on the input order.
pub fn break_tie<'a, T: 'a>(
    candidates: impl IntoIterator<Item = &'a PolicyAttachment<T>>,
) -> Option<&'a PolicyAttachment<T>> {
    candidates
        .into_iter()
        .map(|attachment| (attachment.id.to_string(), attachment))
        .min_by(|(a_id, a), (b_id, b)| {
            a.creation_timestamp
                .cmp(&b.creation_timestamp)
                .then_with(|| b_id.cmp(a_id))
        })
        .map(|(_, attachment)| attachment)
}

// === impl PolicyAttachment ===

impl<T: Merge> PolicyAttachment<T> {
    /// Resolves the effective value of an up-scoped and a down-scoped attachment.
    pub fn layered(up: Option<&Self>, down: Option<&Self>) -> Option<T> {
        select_effective(
            up.and_then(|p| p.overrides.as_ref()),
            up.and_then(|p| p.default.as_ref()),
            down.and_then(|p| p.overrides.as_ref()),
            down.and_then(|p| p.default.as_ref()),
        )
    }
}

// === impl Merge ===

macro_rules! merge_scalars {
    ($($ty:ty => $unset:expr),+ $(,)?) => {
        $(
            impl Merge for $ty {
                #[inline]
                fn is_unset(&self) -> bool {
                    *self == $unset
                }

                #[inline]
                fn merge(&self, lower: &Self) -> Self {
                    if self.is_unset() {
                        lower.clone()
                    } else {
                        self.clone()
                    }
                }
            }
        )+
    };
}

merge_scalars! {
    bool => false,
    u16 => 0,
    u32 => 0,
    u64 => 0,
    i64 => 0,
}

impl Merge for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn merge(&self, lower: &Self) -> Self {
        if self.is_empty() {
            lower.clone()
        } else {
            self.clone()
        }
    }
}

/// Lists are replaced atomically.
impl<T: Clone> Merge for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn merge(&self, lower: &Self) -> Self {
        if self.is_empty() {
            lower.clone()
        } else {
            self.clone()
        }
    }
}

/// Maps are replaced atomically.
impl<K: Clone + Ord, V: Clone> Merge for BTreeMap<K, V> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn merge(&self, lower: &Self) -> Self {
        if self.is_empty() {
            lower.clone()
        } else {
            self.clone()
        }
    }
}

/// An optional nested structure is set whenever it is present. When both layers are present,
/// their contents are combined recursively.
impl<T: Merge> Merge for Option<T> {
    fn is_unset(&self) -> bool {
        self.is_none()
    }

    fn merge(&self, lower: &Self) -> Self {
        match (self, lower) {
            (Some(higher), Some(lower)) => Some(higher.merge(lower)),
            (Some(higher), None) => Some(higher.clone()),
            (None, lower) => lower.clone(),
        }
    }
}
