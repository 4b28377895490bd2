#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use apigw_controller_core as core;
pub use apigw_controller_k8s_api as k8s;
pub use apigw_controller_k8s_index as index;
pub use apigw_controller_k8s_status as status;

mod args;
mod publish;

pub use self::{args::Args, publish::Publisher};

use crate::core::{queue::Receiver, Outcome};

/// Acknowledges every applied outcome on the target's status.
async fn report_outcomes(mut outcomes: Receiver<Outcome>, status: status::Sender) {
    while let Some(outcome) = outcomes.recv().await {
        tracing::debug!(family = %outcome.family, id = %outcome.id, "Reporting outcome");
        status.send(status::outcome_update(&outcome, chrono::Utc::now()));
    }
    tracing::debug!("Outcomes closed");
}

/// Flushes coalesced status updates until shutdown, then flushes once more.
async fn flush_until_shutdown(flusher: status::Flusher, drain: drain::Watch) {
    tokio::select! {
        _ = flusher.run() => {}
        release = drain.signaled() => {
            let n = flusher.flush();
            tracing::debug!(updates = n, "Flushed status updates on shutdown");
            drop(release);
        }
    }
}
