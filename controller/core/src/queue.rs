//! Bounded queues with explicit behavior when full.
//!
//! [`blocking`] queues carry events that must not be lost: a producer waits for capacity.
//! [`lossy`] queues carry best-effort notifications: when full, the item is dropped with a
//! warning and the producer proceeds.

use std::fmt;
use tokio::sync::mpsc;

/// Creates a bounded queue whose producers wait for capacity.
pub fn blocking<T>(capacity: usize) -> (BlockingSender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (BlockingSender(tx), Receiver(rx))
}

/// Creates a bounded queue that drops items when full.
///
/// `name` identifies the queue in logs.
pub fn lossy<T>(capacity: usize, name: &'static str) -> (LossySender<T>, Receiver<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (LossySender { tx, name }, Receiver(rx))
}

pub struct BlockingSender<T>(mpsc::Sender<T>);

pub struct LossySender<T> {
    tx: mpsc::Sender<T>,
    name: &'static str,
}

pub struct Receiver<T>(mpsc::Receiver<T>);

/// Indicates that an item could not be queued.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError<T> {
    #[error("queue closed")]
    Closed(T),
    #[error("queue full")]
    Rejected(T),
}

// === impl BlockingSender ===

impl<T> BlockingSender<T> {
    /// Enqueues an item, waiting until the queue has capacity.
    pub async fn push(&self, item: T) -> Result<(), SendError<T>> {
        self.0.send(item).await.map_err(|e| SendError::Closed(e.0))
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

impl<T> Clone for BlockingSender<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> fmt::Debug for BlockingSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingSender")
            .field("capacity", &self.0.capacity())
            .finish()
    }
}

// === impl LossySender ===

impl<T> LossySender<T> {
    /// Enqueues an item if the queue has capacity.
    pub fn try_push(&self, item: T) -> Result<(), SendError<T>> {
        self.tx.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(item) => SendError::Rejected(item),
            mpsc::error::TrySendError::Closed(item) => SendError::Closed(item),
        })
    }

    /// Enqueues an item, dropping it with a warning if the queue is full or closed.
    ///
    /// Returns true if the item was queued.
    pub fn push(&self, item: T) -> bool {
        match self.try_push(item) {
            Ok(()) => true,
            Err(SendError::Rejected(_)) => {
                tracing::warn!(queue = %self.name, "Queue full; dropping item");
                false
            }
            Err(SendError::Closed(_)) => {
                tracing::debug!(queue = %self.name, "Queue closed; dropping item");
                false
            }
        }
    }
}

impl<T> Clone for LossySender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            name: self.name,
        }
    }
}

impl<T> fmt::Debug for LossySender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LossySender")
            .field("name", &self.name)
            .field("capacity", &self.tx.capacity())
            .finish()
    }
}

// === impl Receiver ===

impl<T> Receiver<T> {
    /// Receives the next item, or `None` once every sender is dropped and the queue drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.0.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.0.try_recv().ok()
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lossy_drops_when_full() {
        let (tx, mut rx) = lossy(2, "test");
        assert!(tx.push(1));
        assert!(tx.push(2));
        assert!(!tx.push(3));
        assert_eq!(tx.try_push(4), Err(SendError::Rejected(4)));

        assert_eq!(rx.recv().await, Some(1));
        assert!(tx.push(5));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(5));
        assert_eq!(rx.try_recv(), None);
    }

    #[tokio::test]
    async fn lossy_reports_closed() {
        let (tx, rx) = lossy::<u8>(1, "test");
        drop(rx);
        assert_eq!(tx.try_push(1), Err(SendError::Closed(1)));
        assert!(!tx.push(2));
    }

    #[tokio::test]
    async fn blocking_preserves_order() {
        let (tx, mut rx) = blocking(4);
        for i in 0..4 {
            tx.push(i).await.expect("queue must be open");
        }
        drop(tx);
        let mut received = Vec::new();
        while let Some(i) = rx.recv().await {
            received.push(i);
        }
        assert_eq!(received, vec![0, 1, 2, 3]);
    }
}
