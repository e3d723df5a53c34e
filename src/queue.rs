// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deduplicating, rate-limited work queue.
//!
//! The queue hands out keys to a consumer with three guarantees:
//!
//! 1. **Coalescing** - adding a key that is already waiting is a no-op.
//! 2. **Per-key exclusion** - a key handed out by [`WorkQueue::get`] is not handed out
//!    again until [`WorkQueue::done`] is called for it. Adds that arrive in between are
//!    remembered and scheduled once the key is done.
//! 3. **Draining shutdown** - after [`WorkQueue::shut_down`], new adds are ignored,
//!    waiting keys are still handed out, and `get` returns `None` once the queue is empty.
//!
//! # Example
//!
//! ```rust,no_run
//! use corezone::queue::WorkQueue;
//!
//! # async fn example() {
//! let queue: WorkQueue<String> = WorkQueue::new();
//! queue.add("default/example-com".to_string());
//!
//! while let Some(key) = queue.get().await {
//!     // ... reconcile key ...
//!     queue.forget(&key);
//!     queue.done(&key);
//! }
//! # }
//! ```

use crate::retry::{ExponentialBackoff, ItemRateLimiter};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Bound on the items a [`WorkQueue`] can hold.
pub trait QueueItem: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> QueueItem for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

struct State<K> {
    /// Keys ready to be handed out, in order
    queue: VecDeque<K>,
    /// Keys that need processing (waiting in `queue` or re-added while processing)
    dirty: HashSet<K>,
    /// Keys currently handed out and not yet done
    processing: HashSet<K>,
    shutting_down: bool,
    limiter: ItemRateLimiter<K>,
}

struct Inner<K> {
    state: Mutex<State<K>>,
    notify: Notify,
}

/// Handle to a shared work queue. Cloning yields another handle to the same queue.
pub struct WorkQueue<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: QueueItem> Default for WorkQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: QueueItem> WorkQueue<K> {
    /// Create a queue with the default backoff schedule.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backoff(ExponentialBackoff::default())
    }

    /// Create a queue whose rate-limited adds follow `backoff`.
    #[must_use]
    pub fn with_backoff(backoff: ExponentialBackoff) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                    limiter: ItemRateLimiter::new(backoff),
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Mark `key` as needing processing.
    ///
    /// Ignored after shutdown. A key already waiting collapses into the pending pass;
    /// a key currently being processed is scheduled again once it is done.
    pub fn add(&self, key: K) {
        let mut state = self.inner.state.lock();
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Wait for the next key.
    ///
    /// Returns `None` once the queue has been shut down and every waiting key has been
    /// handed out. Cancel-safe: a key is only removed from the queue in the same poll
    /// that returns it.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Mark the pass for `key` as complete.
    ///
    /// If `key` was re-added while being processed it is put back on the queue now.
    pub fn done(&self, key: &K) {
        let mut state = self.inner.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.clone());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Re-add `key` after its backoff delay, counting one more requeue.
    ///
    /// Must be called from within a Tokio runtime; the delayed add runs on a spawned task.
    pub fn add_rate_limited(&self, key: K) {
        let delay = {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return;
            }
            state.limiter.when(&key)
        };
        self.add_after(key, delay);
    }

    /// Re-add `key` once `delay` has elapsed.
    pub fn add_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        debug!(key = ?key, delay = ?delay, "Scheduling delayed add");
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Clear the retry history of `key`.
    pub fn forget(&self, key: &K) {
        self.inner.state.lock().limiter.forget(key);
    }

    /// Number of rate-limited re-adds of `key` since it was last forgotten.
    #[must_use]
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.inner.state.lock().limiter.num_requeues(key)
    }

    /// Number of keys waiting to be handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Whether no key is waiting to be handed out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting new keys and wake every waiting consumer.
    pub fn shut_down(&self) {
        self.inner.state.lock().shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    /// Whether [`WorkQueue::shut_down`] has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
