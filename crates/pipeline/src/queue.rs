//! Bounded drop-oldest ingress queue.
//!
//! The broker connection pushes every received message here without ever
//! waiting on the worker. When the queue is full the oldest queued message
//! is evicted to make room, so bursts lose old data rather than new.
//! The single consumer waits on a [`Notify`] instead of polling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ampel_core::buffer::BoundedBuffer;
use ampel_core::telemetry::RawMessage;
use tokio::sync::Notify;

/// Log one overflow warning per this many dropped messages.
const DROP_LOG_EVERY: u64 = 100;

/// Multi-producer, single-consumer bounded queue of [`RawMessage`]s.
pub struct IngressQueue {
    items: Mutex<BoundedBuffer<RawMessage>>,
    notify: Notify,
    dropped: AtomicU64,
}

impl IngressQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(BoundedBuffer::new(capacity)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a message without blocking.
    ///
    /// Returns the message evicted to make room, if the queue was full.
    pub fn push(&self, message: RawMessage) -> Option<RawMessage> {
        let evicted = self.lock().push_back(message);
        self.notify.notify_one();

        if let Some(ref old) = evicted {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 || dropped % DROP_LOG_EVERY == 0 {
                tracing::warn!(
                    dropped,
                    topic = %old.topic,
                    "Ingress queue full, dropping oldest message",
                );
            }
        }
        evicted
    }

    /// Dequeue the oldest message if one is available.
    pub fn try_pop(&self) -> Option<RawMessage> {
        self.lock().pop_front()
    }

    /// Wait until a message is available and dequeue it.
    ///
    /// Intended for a single consumer; concurrent callers are safe but
    /// may wake spuriously.
    pub async fn pop(&self) -> RawMessage {
        loop {
            if let Some(message) = self.try_pop() {
                return message;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Total messages evicted by overflow since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, BoundedBuffer<RawMessage>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
