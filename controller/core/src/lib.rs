#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Resolution core of the API gateway controller.
//!
//! Watched resources are resolved into per-target snapshots (`ApiState`, `GatewayState`). Each
//! snapshot is folded into a [`StateCache`], which decides whether anything changed since the
//! last deployment. Changed snapshots travel over a bounded [`queue`] to a single
//! [`Synchronizer`] per resource family, which applies them downstream and reports outcomes.

pub mod cache;
pub mod event;
mod identity;
pub mod merge;
pub mod policy;
pub mod queue;
pub mod state;
pub mod synchronize;

#[cfg(test)]
mod tests;

pub use self::{
    cache::{Diff, SharedCache, StateCache},
    event::{EventKind, LifecycleEvent, Outcome, OutcomeKind},
    identity::ResourceId,
    merge::{break_tie, select_effective, Merge, PolicyAttachment, Scope},
    state::{ApiState, Family, GatewayState, ResolvedState},
    synchronize::{Deployer, Synchronizer},
};

pub const CONTROLLER_NAME: &str = "apigw.io/gateway-controller";
