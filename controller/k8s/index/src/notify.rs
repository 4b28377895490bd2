//! Carries store notifications to the reconcilers.
//!
//! `kubert` applies watch events to the store synchronously, so the store cannot wait for a
//! reconciler. It records each change in an [`Outbox`] instead. Every watch is wrapped with
//! [`Notifier::gate`], which moves the outbox into the reconcilers' bounded queues before the
//! next watch event is read. A reconciler that stops draining its queue therefore stalls the
//! watches, and the outbox never holds more than the changes of the events being applied.

use crate::store::Notification;
use apigw_controller_core::queue::BlockingSender;
use futures::{stream, Stream, StreamExt};
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};

/// Notifications recorded by the store that have not been queued yet.
#[derive(Clone, Debug, Default)]
pub struct Outbox(Arc<Mutex<VecDeque<Notification>>>);

/// Moves notifications from the [`Outbox`] into one bounded queue per reconciler.
#[derive(Clone, Debug)]
pub struct Notifier {
    outbox: Outbox,
    reconcilers: Arc<[BlockingSender<Notification>]>,
}

// === impl Outbox ===

impl Outbox {
    pub(crate) fn push(&self, notification: Notification) {
        self.0.lock().push_back(notification);
    }

    pub fn pop(&self) -> Option<Notification> {
        self.0.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Takes every pending notification.
    pub fn drain(&self) -> Vec<Notification> {
        self.0.lock().drain(..).collect()
    }
}

// === impl Notifier ===

impl Notifier {
    pub fn new(outbox: Outbox, reconcilers: Vec<BlockingSender<Notification>>) -> Self {
        Self {
            outbox,
            reconcilers: reconcilers.into(),
        }
    }

    /// Queues every pending notification for each reconciler, waiting while a queue is full.
    ///
    /// Returns the number of notifications taken from the outbox.
    pub async fn flush(&self) -> usize {
        let mut flushed = 0;
        while let Some(notification) = self.outbox.pop() {
            flushed += 1;
            for reconciler in self.reconcilers.iter() {
                if reconciler.push(notification.clone()).await.is_err() {
                    let Notification { kind, id } = &notification;
                    tracing::debug!(%kind, %id, "Reconciler closed");
                }
            }
        }
        flushed
    }

    /// Wraps a watch so that each event is read only once the notifications raised by the
    /// previous one are queued.
    pub fn gate<S>(&self, events: S) -> impl Stream<Item = S::Item> + Send + 'static
    where
        S: Stream + Send + 'static,
        S::Item: Send,
    {
        stream::unfold(
            (Box::pin(events), self.clone()),
            |(mut events, notifier)| async move {
                notifier.flush().await;
                let event = events.next().await?;
                Some((event, (events, notifier)))
            },
        )
    }
}
