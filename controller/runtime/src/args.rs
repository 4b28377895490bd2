use crate::{
    core::{self, queue, ApiState, GatewayState, Synchronizer},
    index::{self, Notifier, Outbox, Reconciler, Store, Sweep},
    k8s::{self, gateway},
    flush_until_shutdown, report_outcomes, status, Publisher,
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "apigw", about = "An API gateway resource controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "apigw=info,warn",
        env = "APIGW_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Comma-separated namespaces to reconcile. All namespaces are reconciled when unset.
    #[clap(long)]
    namespaces: Option<Namespaces>,

    /// Gateways are managed only when their class names this controller.
    #[clap(long, default_value = core::CONTROLLER_NAME)]
    controller_name: String,

    /// Resource changes buffered per resource family before the watches wait.
    #[clap(long, default_value = "100")]
    notification_queue_capacity: usize,

    /// Lifecycle events buffered per resource family before reconciliation waits.
    #[clap(long, default_value = "10")]
    event_queue_capacity: usize,

    /// Outcomes buffered before they are dropped.
    #[clap(long, default_value = "10")]
    outcome_queue_capacity: usize,

    #[clap(long, default_value = "50")]
    status_queue_capacity: usize,

    /// Status updates are coalesced over this interval. Zero writes every update.
    #[clap(long, default_value = "2000")]
    status_flush_interval_ms: u64,

    #[clap(long, default_value = "10000")]
    status_timeout_ms: u64,

    #[clap(long, default_value = "5")]
    status_retry_steps: u32,

    #[clap(long, default_value = "10")]
    status_retry_base_ms: u64,

    #[clap(long, default_value = "1000")]
    status_retry_max_ms: u64,
}

#[derive(Clone, Debug)]
struct Namespaces(Vec<String>);

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    /// Fails if any queue would have no capacity.
    fn validate(&self) -> Result<()> {
        let queues = [
            ("--notification-queue-capacity", self.notification_queue_capacity),
            ("--event-queue-capacity", self.event_queue_capacity),
            ("--outcome-queue-capacity", self.outcome_queue_capacity),
            ("--status-queue-capacity", self.status_queue_capacity),
        ];
        for (flag, capacity) in queues {
            if capacity == 0 {
                bail!("{flag} must be greater than zero");
            }
        }
        Ok(())
    }

    pub async fn run(self) -> Result<()> {
        self.validate()?;
        let Self {
            log_level,
            log_format,
            client,
            admin,
            namespaces,
            controller_name,
            notification_queue_capacity,
            event_queue_capacity,
            outcome_queue_capacity,
            status_queue_capacity,
            status_flush_interval_ms,
            status_timeout_ms,
            status_retry_steps,
            status_retry_base_ms,
            status_retry_max_ms,
        } = self;

        let status_config = status::Config {
            queue_capacity: status_queue_capacity,
            timeout: Duration::from_millis(status_timeout_ms),
            flush_interval: Duration::from_millis(status_flush_interval_ms),
            backoff: status::Backoff {
                steps: status_retry_steps,
                base: Duration::from_millis(status_retry_base_ms),
                max: Duration::from_millis(status_retry_max_ms),
                ..Default::default()
            },
        };
        let config = index::Config { controller_name };

        // Every change to the store is queued for each family's reconciler so that affected
        // targets are re-resolved. Watches wait while a reconciler's queue is full.
        let outbox = Outbox::default();
        let store = Store::shared(namespaces.map(|Namespaces(ns)| ns), outbox.clone());
        let (api_notifications_tx, api_notifications_rx) =
            queue::blocking(notification_queue_capacity);
        let (gateway_notifications_tx, gateway_notifications_rx) =
            queue::blocking(notification_queue_capacity);
        let notifier = Notifier::new(
            outbox,
            vec![api_notifications_tx, gateway_notifications_tx],
        );

        let api_cache = core::StateCache::<ApiState>::shared();
        let gateway_cache = core::StateCache::<GatewayState>::shared();

        let mut prom = <Registry>::default();
        let indexed =
            index::IndexMetrics::register(store.clone(), prom.sub_registry_with_prefix("index"))
                .shared();
        let cache_metrics = prom.sub_registry_with_prefix("cache");
        core::cache::register(cache_metrics, api_cache.clone());
        core::cache::register(cache_metrics, gateway_cache.clone());
        let status_metrics =
            status::StatusMetrics::register(prom.sub_registry_with_prefix("status"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        // Spawn resource watches.

        let apis = runtime.watch_all::<k8s::Api>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(apis))
                .instrument(info_span!("apis")),
        );

        let routes = runtime.watch_all::<gateway::HttpRoute>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(routes))
                .instrument(info_span!("httproutes.gateway.networking.k8s.io")),
        );

        let gateways = runtime.watch_all::<gateway::Gateway>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(gateways))
                .instrument(info_span!("gateways")),
        );

        let gateway_classes =
            runtime.watch_all::<gateway::GatewayClass>(watcher::Config::default());
        tokio::spawn(
            kubert::index::cluster(indexed.clone(), notifier.gate(gateway_classes))
                .instrument(info_span!("gatewayclasses")),
        );

        let authentications =
            runtime.watch_all::<k8s::Authentication>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(authentications))
                .instrument(info_span!("authentications")),
        );

        let rate_limit_policies =
            runtime.watch_all::<k8s::RateLimitPolicy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(rate_limit_policies))
                .instrument(info_span!("ratelimitpolicies")),
        );

        let api_policies = runtime.watch_all::<k8s::ApiPolicy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(api_policies))
                .instrument(info_span!("apipolicies")),
        );

        let backends = runtime.watch_all::<k8s::Backend>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(backends))
                .instrument(info_span!("backends")),
        );

        let interceptor_services =
            runtime.watch_all::<k8s::InterceptorService>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(interceptor_services))
                .instrument(info_span!("interceptorservices")),
        );

        let backend_jwts = runtime.watch_all::<k8s::BackendJwt>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(backend_jwts))
                .instrument(info_span!("backendjwts")),
        );

        let token_issuers = runtime.watch_all::<k8s::TokenIssuer>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(token_issuers))
                .instrument(info_span!("tokenissuers")),
        );

        let secrets = runtime.watch_all::<k8s::Secret>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed.clone(), notifier.gate(secrets))
                .instrument(info_span!("secrets")),
        );

        let config_maps = runtime.watch_all::<k8s::ConfigMap>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(indexed, notifier.gate(config_maps))
                .instrument(info_span!("configmaps")),
        );

        // Write outcomes back to resource status.
        let client = Arc::new(status::KubeStatusClient::new(runtime.client()));
        let (handler, worker) =
            status::Handler::new(client, &status_config, status_metrics.clone());
        tokio::spawn(worker.run().instrument(info_span!("status")));
        let status = if status_config.flush_interval.is_zero() {
            status::Sender::Direct(handler)
        } else {
            let (deduper, flusher) =
                status::Deduper::new(handler, status_config.flush_interval, status_metrics);
            tokio::spawn(
                flush_until_shutdown(flusher, runtime.shutdown_handle())
                    .instrument(info_span!("status_flusher")),
            );
            status::Sender::Deduped(deduper)
        };
        let (outcomes_tx, outcomes_rx) = queue::lossy(outcome_queue_capacity, "outcomes");
        tokio::spawn(report_outcomes(outcomes_rx, status).instrument(info_span!("outcomes")));

        // Reconcile targets and synchronize them downstream, one pipeline per family.
        let (api_events_tx, api_events_rx) = queue::blocking(event_queue_capacity);
        let (gateway_events_tx, gateway_events_rx) = queue::blocking(event_queue_capacity);
        let api_sweep = Sweep::new();
        let gateway_sweep = Sweep::new();

        let apis = Reconciler::new(
            store.clone(),
            config.clone(),
            api_cache,
            api_events_tx,
            api_sweep.clone(),
        );
        tokio::spawn(
            apis.run(api_notifications_rx)
                .instrument(info_span!("reconcile", family = "API")),
        );
        let gateways = Reconciler::new(
            store,
            config,
            gateway_cache,
            gateway_events_tx,
            gateway_sweep.clone(),
        );
        tokio::spawn(
            gateways
                .run(gateway_notifications_rx)
                .instrument(info_span!("reconcile", family = "Gateway")),
        );

        let apis = Synchronizer::new(
            api_events_rx,
            Arc::new(Publisher::<ApiState>::default()),
            outcomes_tx.clone(),
        );
        tokio::spawn(apis.run().instrument(info_span!("synchronize", family = "API")));
        let gateways = Synchronizer::new(
            gateway_events_rx,
            Arc::new(Publisher::<GatewayState>::default()),
            outcomes_tx,
        );
        tokio::spawn(
            gateways
                .run()
                .instrument(info_span!("synchronize", family = "Gateway")),
        );

        tokio::spawn(async move {
            api_sweep.ready().await;
            gateway_sweep.ready().await;
            info!("Controller ready");
        });

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

impl std::str::FromStr for Namespaces {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        let namespaces = s
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if namespaces.is_empty() {
            bail!("no namespaces in {s:?}");
        }
        Ok(Self(namespaces))
    }
}
