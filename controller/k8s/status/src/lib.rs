#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Writes deployment outcomes back to the status of the target resources.
//!
//! Requests are queued on a [`Handler`], whose [`Worker`] re-fetches each resource, applies the
//! request's mutator and patches the status subresource only when it changed. A [`Deduper`] may
//! sit in front of the handler to coalesce bursts of requests for the same resource.

mod client;
mod dedup;
mod handler;
mod metrics;
mod outcome;
mod retry;

#[cfg(test)]
mod tests;

pub use self::{
    client::{Current, Error, KubeStatusClient, StatusClient, Target},
    dedup::{Deduper, Flusher},
    handler::{Config, Handler, Mutator, Sender, Update, Worker},
    metrics::StatusMetrics,
    outcome::{api_update, gateway_update, outcome_update},
    retry::Backoff,
};

/// Identifies this controller as the manager of the fields it writes.
pub const FIELD_MANAGER: &str = "apigw-controller";
