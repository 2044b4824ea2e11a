//! In-memory integer channel connecting machines to each other and to drivers.
//!
//! A channel is an unbounded FIFO queue shared through an [`Arc`]. Values are
//! delivered in the order they were put, never dropped, reordered or duplicated.
//! Each channel has one logical producer and one logical consumer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// FIFO queue of integers with a waiting `take` and a non-consuming `peek`.
#[derive(Debug, Default)]
pub struct Channel {
    queue: Mutex<VecDeque<i64>>,
    available: Notify,
}

impl Channel {
    /// Creates an empty channel.
    ///
    /// The channel is wrapped in an Arc so it can be shared between a producer and a consumer.
    pub fn new() -> Arc<Channel> {
        Arc::new(Channel::default())
    }

    /// Creates a channel pre-loaded with `values`.
    pub fn with_values(values: impl IntoIterator<Item = i64>) -> Arc<Channel> {
        let channel = Channel::new();
        channel.extend(values);
        channel
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<i64>> {
        // The queue holds plain integers, so a panic while holding the lock cannot
        // leave it in a broken state.
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a value to the tail and wakes the consumer.
    pub fn put(&self, value: i64) {
        self.lock().push_back(value);
        self.available.notify_one();
    }

    /// Appends every value, in order.
    pub fn extend(&self, values: impl IntoIterator<Item = i64>) {
        let mut queue = self.lock();
        let before = queue.len();
        queue.extend(values);
        let added = queue.len() > before;
        drop(queue);
        if added {
            self.available.notify_one();
        }
    }

    /// Removes and returns the head, waiting until a value is available.
    pub async fn take(&self) -> i64 {
        loop {
            if let Some(value) = self.try_take() {
                return value;
            }
            self.available.notified().await;
        }
    }

    /// Waits until at least one value is queued, without consuming it.
    pub async fn ready(&self) {
        while self.is_empty() {
            self.available.notified().await;
        }
    }

    /// Removes and returns the head, or `None` if the channel is empty.
    pub fn try_take(&self) -> Option<i64> {
        self.lock().pop_front()
    }

    /// Returns the head without removing it, or `None` if the channel is empty.
    pub fn peek(&self) -> Option<i64> {
        self.lock().front().copied()
    }

    /// Returns the number of queued values.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no value is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every queued value, in order.
    pub fn drain(&self) -> Vec<i64> {
        self.lock().drain(..).collect()
    }

    /// Removes and returns the first `count` values, or nothing if fewer are queued.
    pub fn take_exact(&self, count: usize) -> Option<Vec<i64>> {
        let mut queue = self.lock();
        if queue.len() < count {
            return None;
        }
        Some(queue.drain(..count).collect())
    }
}
