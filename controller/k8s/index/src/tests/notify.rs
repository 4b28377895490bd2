use super::{config, id, mk_api, mk_backend, mk_route};
use crate::{Kind, Notification, Notifier, Outbox, Reconciler, Store, Sweep};
use apigw_controller_core::{queue, ApiState, LifecycleEvent, StateCache};
use apigw_controller_k8s_api::{self as k8s, GROUP};
use futures::{stream, Stream, StreamExt};
use kube::runtime::watcher;
use kubert::index::IndexNamespacedResource;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio_test::{assert_pending, assert_ready, task};

fn applied(names: &[&str]) -> impl Stream<Item = watcher::Event<k8s::Backend>> {
    let events = names
        .iter()
        .map(|name| watcher::Event::Applied(mk_backend(name, 8080)))
        .collect::<Vec<_>>();
    stream::iter(events)
}

#[tokio::test]
async fn watch_waits_for_queued_notifications() {
    let outbox = Outbox::default();
    let store = Store::shared(None, outbox.clone());
    let (tx, mut rx) = queue::blocking(1);
    let notifier = Notifier::new(outbox.clone(), vec![tx]);

    let events = notifier.gate(applied(&["a", "b", "c", "d"]));
    let mut watch = task::spawn(kubert::index::namespaced(store.clone(), events));

    // `a` fills the queue; `b` is applied but its notification waits for room.
    assert_pending!(watch.poll());
    assert_eq!(store.read().len::<k8s::Backend>(), 2);
    assert!(outbox.is_empty());

    assert_eq!(
        rx.try_recv(),
        Some(Notification {
            kind: Kind::Backend,
            id: id("a"),
        })
    );
    assert_pending!(watch.poll());
    assert_eq!(store.read().len::<k8s::Backend>(), 3);

    assert_eq!(rx.try_recv().map(|n| n.id), Some(id("b")));
    assert_pending!(watch.poll());
    assert_eq!(store.read().len::<k8s::Backend>(), 4);

    // The watch ends once its last notification is queued.
    assert_eq!(rx.try_recv().map(|n| n.id), Some(id("c")));
    assert_ready!(watch.poll());
    assert_eq!(rx.try_recv().map(|n| n.id), Some(id("d")));
    assert_eq!(rx.try_recv(), None);
}

#[tokio::test]
async fn full_event_queue_stalls_watches() {
    let outbox = Outbox::default();
    let store = Store::shared(None, outbox.clone());
    store.write().apply(mk_backend("backend", 8080));
    store.write().apply(mk_route(
        "prod-route",
        json!({
            "rules": [{
                "backendRefs": [{"group": GROUP, "kind": "Backend", "name": "backend", "port": 8080}],
            }],
        }),
    ));
    for name in ["api1", "api2", "api3"] {
        store.write().apply(mk_api(name, 1, &["prod-route"]));
    }
    outbox.drain();

    // Nothing consumes lifecycle events.
    let (events_tx, _events) = queue::blocking::<LifecycleEvent<ApiState>>(1);
    let (notifications_tx, notifications_rx) = queue::blocking(1);
    let reconciler = Reconciler::new(
        store.clone(),
        config(),
        StateCache::shared(),
        events_tx,
        Sweep::new(),
    );
    tokio::spawn(reconciler.run(notifications_rx));

    let consumed = Arc::new(AtomicUsize::new(0));
    let reapplies = {
        let consumed = consumed.clone();
        stream::iter((0..500).map(|i| watcher::Event::Applied(mk_backend("backend", 8000 + i))))
            .inspect(move |_| {
                consumed.fetch_add(1, Ordering::SeqCst);
            })
    };
    let notifier = Notifier::new(outbox.clone(), vec![notifications_tx]);
    let watch = tokio::spawn(kubert::index::namespaced(
        store.clone(),
        notifier.gate(reapplies),
    ));

    for _ in 0..100 {
        tokio::task::yield_now().await;
    }

    // The reconciler holds one notification while it waits on the event queue, a second is
    // queued and the watch waits to queue a third.
    assert!(!watch.is_finished());
    assert_eq!(consumed.load(Ordering::SeqCst), 3);
    assert!(outbox.is_empty());
    watch.abort();
}
