//! Resolved state snapshots and the group comparisons used to diff them.

mod api;
mod dependency;
mod gateway;

pub use self::{
    api::{
        ApiDefinition, ApiDerived, ApiState, Environment, PathMatch, PolicyKind, PolicyRef,
        ResolvedResource, Route, RouteRule, WeightedBackend,
    },
    dependency::{
        BackendSecurity, BackendService, BackendTls, CircuitBreaker, HealthCheck,
        InterceptorService, ResolvedBackend, Retry, Timeout, TokenIssuer,
    },
    gateway::{GatewayDefinition, GatewayDerived, GatewayState, Listener},
};
use crate::ResourceId;
use ahash::AHashMap as HashMap;
use std::fmt;

/// A family of target resources that are resolved, cached and deployed independently.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    Api,
    Gateway,
}

/// The fully resolved configuration of a single target resource.
pub trait ResolvedState: Clone + fmt::Debug + Send + Sync + 'static {
    const FAMILY: Family;

    fn id(&self) -> &ResourceId;

    /// The generation of the target resource's own definition.
    fn generation(&self) -> i64;

    /// Records the label of every populated dependent group, in canonical order.
    fn populated(&self, aspects: &mut Aspects);

    /// Folds a freshly resolved state into this (cached) one.
    ///
    /// Each group that differs is replaced wholesale and its label recorded. Derived values are
    /// taken from `new` only when something changed.
    fn reconcile(&mut self, new: Self, aspects: &mut Aspects);
}

/// A resolved resource along with the metadata used to detect that it changed.
#[derive(Clone, Debug, PartialEq)]
pub struct Versioned<T> {
    pub id: ResourceId,
    pub uid: Option<String>,
    pub generation: i64,
    pub spec: T,
}

/// Resolved resources of one kind, keyed by their own identity.
#[derive(Clone, Debug, PartialEq)]
pub struct Dependents<T>(HashMap<ResourceId, Versioned<T>>);

/// An ordered set of changed-aspect labels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Aspects(Vec<&'static str>);

// === impl Family ===

impl Family {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Gateway => "Gateway",
        }
    }

    pub fn definition_label(&self) -> &'static str {
        match self {
            Self::Api => "API Definition",
            Self::Gateway => "Gateway Definition",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind().fmt(f)
    }
}

// === impl Versioned ===

impl<T> Versioned<T> {
    pub fn new(id: ResourceId, spec: T) -> Self {
        Self {
            id,
            uid: None,
            generation: 0,
            spec,
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = generation;
        self
    }

    /// Returns true if `self` is a newer version, or a different incarnation, of `cached`.
    pub fn supersedes(&self, cached: &Self) -> bool {
        self.generation > cached.generation || self.uid != cached.uid
    }
}

// === impl Dependents ===

impl<T> Default for Dependents<T> {
    fn default() -> Self {
        Self(HashMap::default())
    }
}

impl<T> Dependents<T> {
    /// Inserts a resource under its own identity.
    pub fn insert(&mut self, resource: Versioned<T>) -> Option<Versioned<T>> {
        self.0.insert(resource.id.clone(), resource)
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Versioned<T>> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Versioned<T>> {
        self.0.values()
    }

    /// Resources sorted by identity.
    pub fn sorted(&self) -> Vec<&Versioned<T>> {
        let mut resources = self.0.values().collect::<Vec<_>>();
        resources.sort_by(|a, b| a.id.cmp(&b.id));
        resources
    }

    /// Returns true if `new` differs from this group in membership or in the version of any
    /// member.
    pub fn is_superseded_by(&self, new: &Self) -> bool {
        if self.0.len() != new.0.len() {
            return true;
        }
        new.0.iter().any(|(id, resource)| match self.0.get(id) {
            Some(cached) => resource.supersedes(cached),
            None => true,
        })
    }
}

impl<T> FromIterator<Versioned<T>> for Dependents<T> {
    fn from_iter<I: IntoIterator<Item = Versioned<T>>>(iter: I) -> Self {
        let mut dependents = Self::default();
        for resource in iter {
            dependents.insert(resource);
        }
        dependents
    }
}

// === impl Aspects ===

impl Aspects {
    /// Records a label unless it was already recorded.
    pub fn record(&mut self, label: &'static str) {
        if !self.0.contains(&label) {
            self.0.push(label);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }

    pub fn into_vec(self) -> Vec<&'static str> {
        self.0
    }
}

// === group comparisons ===

/// Replaces a versioned resource when the new one supersedes it.
fn gate_versioned<T>(
    cached: &mut Versioned<T>,
    new: Versioned<T>,
    label: &'static str,
    aspects: &mut Aspects,
) {
    if new.supersedes(cached) {
        *cached = new;
        aspects.record(label);
    }
}

/// Replaces an optional group when its presence, membership or member versions changed.
fn gate_optional<T>(
    cached: &mut Option<Dependents<T>>,
    new: Option<Dependents<T>>,
    label: &'static str,
    aspects: &mut Aspects,
) {
    let changed = match (&*cached, &new) {
        (None, None) => false,
        (Some(cached), Some(new)) => cached.is_superseded_by(new),
        _ => true,
    };
    if changed {
        *cached = new;
        aspects.record(label);
    }
}

/// Replaces a whole group when its membership or member versions changed.
fn gate_members<T>(
    cached: &mut Dependents<T>,
    new: Dependents<T>,
    label: &'static str,
    aspects: &mut Aspects,
) {
    if cached.is_superseded_by(&new) {
        *cached = new;
        aspects.record(label);
    }
}

/// Replaces a group whose contents are compared structurally.
fn gate_equal<T: PartialEq>(cached: &mut T, new: T, label: &'static str, aspects: &mut Aspects) {
    if *cached != new {
        *cached = new;
        aspects.record(label);
    }
}

fn record_populated<T>(group: &Dependents<T>, label: &'static str, aspects: &mut Aspects) {
    if !group.is_empty() {
        aspects.record(label);
    }
}
