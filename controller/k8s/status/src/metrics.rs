use apigw_controller_core::Family as ResourceFamily;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Counts status requests by the family of the resource they target.
#[derive(Clone, Debug, Default)]
pub struct StatusMetrics {
    sent: Family<Labels, Counter>,
    dropped: Family<Labels, Counter>,
    coalesced: Family<Labels, Counter>,
    succeeded: Family<Labels, Counter>,
    failed: Family<Labels, Counter>,
    skipped: Family<Labels, Counter>,
    not_found: Family<Labels, Counter>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct Labels {
    family: &'static str,
}

impl StatusMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "updates_sent",
            "Count of status updates queued for writing",
            metrics.sent.clone(),
        );
        prom.register(
            "updates_dropped",
            "Count of status updates dropped because the queue was full",
            metrics.dropped.clone(),
        );
        prom.register(
            "updates_coalesced",
            "Count of status updates replaced by a later update for the same resource",
            metrics.coalesced.clone(),
        );
        prom.register(
            "patches_succeeded",
            "Count of status patches written",
            metrics.succeeded.clone(),
        );
        prom.register(
            "patches_failed",
            "Count of status updates that could not be written",
            metrics.failed.clone(),
        );
        prom.register(
            "patches_skipped",
            "Count of status updates that left the status unchanged",
            metrics.skipped.clone(),
        );
        prom.register(
            "patches_not_found",
            "Count of status updates dropped because the resource no longer exists",
            metrics.not_found.clone(),
        );
        metrics
    }

    pub(crate) fn sent(&self, family: ResourceFamily) {
        self.sent.get_or_create(&Labels::from(family)).inc();
    }

    pub(crate) fn dropped(&self, family: ResourceFamily) {
        self.dropped.get_or_create(&Labels::from(family)).inc();
    }

    pub(crate) fn coalesced(&self, family: ResourceFamily) {
        self.coalesced.get_or_create(&Labels::from(family)).inc();
    }

    pub(crate) fn succeeded(&self, family: ResourceFamily) {
        self.succeeded.get_or_create(&Labels::from(family)).inc();
    }

    pub(crate) fn failed(&self, family: ResourceFamily) {
        self.failed.get_or_create(&Labels::from(family)).inc();
    }

    pub(crate) fn skipped(&self, family: ResourceFamily) {
        self.skipped.get_or_create(&Labels::from(family)).inc();
    }

    pub(crate) fn not_found(&self, family: ResourceFamily) {
        self.not_found.get_or_create(&Labels::from(family)).inc();
    }

    #[cfg(test)]
    pub(crate) fn count(&self, name: &str, family: ResourceFamily) -> u64 {
        let counters = match name {
            "sent" => &self.sent,
            "dropped" => &self.dropped,
            "coalesced" => &self.coalesced,
            "succeeded" => &self.succeeded,
            "failed" => &self.failed,
            "skipped" => &self.skipped,
            "not_found" => &self.not_found,
            _ => panic!("unknown counter {name}"),
        };
        counters.get_or_create(&Labels::from(family)).get()
    }
}

impl From<ResourceFamily> for Labels {
    fn from(family: ResourceFamily) -> Self {
        Self {
            family: family.kind(),
        }
    }
}
