//! Delivery queue
//!
//! The queue is the only mutable state shared between the ingestion endpoint
//! (append only) and the notifier (dequeue only). It is a plain FIFO behind a
//! mutex; no critical section awaits, so an append and a dequeue can only
//! interleave between operations, never inside one.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::broker::message::Message;

/// Process-wide FIFO of messages waiting for the subscriber.
///
/// Cloning yields another handle to the same queue. It is built once at
/// startup and handed to both the HTTP layer and the notifier.
#[derive(Debug, Clone, Default)]
pub struct DeliveryQueue {
    inner: Arc<Mutex<VecDeque<Message>>>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the tail. Never fails.
    pub fn enqueue(&self, message: Message) {
        self.lock().push_back(message);
    }

    /// Removes and returns the head, or `None` when the queue is empty.
    pub fn dequeue_one(&self) -> Option<Message> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A holder that panicked cannot leave the deque half-mutated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
