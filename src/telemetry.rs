//! Telemetry publisher
//!
//! A state cell with subscription: it holds the latest value, hands it to
//! every new subscriber immediately, and fans each later update out to all
//! subscribers in emission order. Every subscriber owns an unbounded queue,
//! so a slow reader never delays publication or the other readers.

use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

struct Inner<T> {
    current: T,
    subscribers: Vec<mpsc::UnboundedSender<T>>,
}

/// Replay-last broadcast of a value
pub struct Publisher<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Publisher<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: initial,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Replace the current value and deliver it to every live subscriber
    pub fn publish(&self, value: T) {
        let mut inner = self.inner.lock();
        inner.current = value;

        let before = inner.subscribers.len();
        let current = inner.current.clone();
        inner
            .subscribers
            .retain(|tx| tx.send(current.clone()).is_ok());

        let dropped = before - inner.subscribers.len();
        if dropped > 0 {
            debug!("Pruned {} closed telemetry subscribers", dropped);
        }
    }

    /// Update the current value in place, then publish the result
    pub fn update(&self, f: impl FnOnce(&mut T)) -> T {
        let mut inner = self.inner.lock();
        f(&mut inner.current);
        let current = inner.current.clone();
        inner
            .subscribers
            .retain(|tx| tx.send(current.clone()).is_ok());
        current
    }

    pub fn current(&self) -> T {
        self.inner.lock().current.clone()
    }

    /// Subscribe; the current value is the first item received
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        // Sending under the lock keeps the replayed value ahead of any later publish
        let _ = tx.send(inner.current.clone());
        inner.subscribers.push(tx);
        Subscription { rx }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

/// Receiving end of a [`Publisher`]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Next value, or `None` once the publisher is gone
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued so far, returning the newest value
    pub fn latest(&mut self) -> Option<T> {
        let mut last = None;
        while let Ok(value) = self.rx.try_recv() {
            last = Some(value);
        }
        last
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}
