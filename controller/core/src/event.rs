use crate::{state::Family, ResourceId};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// A resolved state on its way to the downstream generator.
#[derive(Clone, Debug, PartialEq)]
pub struct LifecycleEvent<S> {
    pub kind: EventKind,
    pub state: S,
    /// Empty for deletions.
    pub aspects: Vec<&'static str>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Create,
    Update,
}

/// Acknowledges that a lifecycle event was applied downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub id: ResourceId,
    pub family: Family,
    pub kind: OutcomeKind,
    pub aspects: Vec<&'static str>,
    /// Generation of the target's definition when it was applied.
    pub generation: i64,
}

// === impl EventKind ===

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => "Create".fmt(f),
            Self::Update => "Update".fmt(f),
            Self::Delete => "Delete".fmt(f),
        }
    }
}

impl EventKind {
    /// The outcome reported once an event of this kind is applied, if any.
    pub fn outcome(&self) -> Option<OutcomeKind> {
        match self {
            Self::Create => Some(OutcomeKind::Create),
            Self::Update => Some(OutcomeKind::Update),
            Self::Delete => None,
        }
    }
}

// === impl LifecycleEvent ===

impl<S> LifecycleEvent<S> {
    pub fn create(state: S, aspects: Vec<&'static str>) -> Self {
        Self {
            kind: EventKind::Create,
            state,
            aspects,
        }
    }

    pub fn update(state: S, aspects: Vec<&'static str>) -> Self {
        Self {
            kind: EventKind::Update,
            state,
            aspects,
        }
    }

    pub fn delete(state: S) -> Self {
        Self {
            kind: EventKind::Delete,
            state,
            aspects: Vec::new(),
        }
    }
}
