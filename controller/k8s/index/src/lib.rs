#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Watches gateway resources and reconciles the targets that depend on them.
//!
//! Resources are indexed into a [`Store`] by `kubert` watches. Every change produces a
//! [`Notification`], which the [`Notifier`] queues for the [`Reconciler`] of each resource
//! family. The reconciler re-resolves each affected target and folds it into the family's cache.
//! When something changed, it queues a lifecycle event.

pub mod metrics;
mod notify;
mod reconcile;
pub mod resolve;
mod store;
mod sweep;

#[cfg(test)]
mod tests;

pub use self::{
    metrics::IndexMetrics,
    notify::{Notifier, Outbox},
    reconcile::Reconciler,
    resolve::{Config, Resolve, ResolveError},
    store::{Indexed, Kind, Notification, SharedStore, Store},
    sweep::{Sweep, SweepState},
};
