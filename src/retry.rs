// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-item exponential backoff for the change queue.
//!
//! Every key that is re-added with [`WorkQueue::add_rate_limited`](crate::queue::WorkQueue::add_rate_limited)
//! waits `base * multiplier^failures`, capped at `max`. The failure count for a key grows
//! with each rate-limited add and is cleared by `forget`.

use crate::constants::{QUEUE_BACKOFF_MULTIPLIER, QUEUE_BASE_DELAY_MILLIS, QUEUE_MAX_DELAY_SECS};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Exponential backoff parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay handed out for the first failure
    pub base_delay: Duration,
    /// Upper bound on any delay
    pub max_delay: Duration,
    /// Growth factor between consecutive failures (typically 2.0 for doubling)
    pub multiplier: f64,
}

impl ExponentialBackoff {
    /// Create a backoff with explicit parameters.
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            base_delay,
            max_delay,
            multiplier,
        }
    }

    /// Delay for the `failures`-th consecutive failure (0-based).
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = i32::try_from(failures).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for ExponentialBackoff {
    /// Queue defaults.
    ///
    /// # Retry Schedule
    ///
    /// 5ms, 10ms, 20ms, 40ms, 80ms, ... doubling until capped at 1000s.
    fn default() -> Self {
        Self::new(
            Duration::from_millis(QUEUE_BASE_DELAY_MILLIS),
            Duration::from_secs(QUEUE_MAX_DELAY_SECS),
            QUEUE_BACKOFF_MULTIPLIER,
        )
    }
}

/// Tracks failures per item and converts them into delays.
#[derive(Debug)]
pub struct ItemRateLimiter<K> {
    backoff: ExponentialBackoff,
    failures: HashMap<K, u32>,
}

impl<K: Eq + Hash + Clone> ItemRateLimiter<K> {
    /// Create a limiter using `backoff` for every item.
    #[must_use]
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            backoff,
            failures: HashMap::new(),
        }
    }

    /// Record a failure for `item` and return how long it must wait.
    pub fn when(&mut self, item: &K) -> Duration {
        let failures = self.failures.entry(item.clone()).or_insert(0);
        let delay = self.backoff.delay_for(*failures);
        *failures = failures.saturating_add(1);
        delay
    }

    /// Number of failures recorded for `item` since it was last forgotten.
    #[must_use]
    pub fn num_requeues(&self, item: &K) -> u32 {
        self.failures.get(item).copied().unwrap_or(0)
    }

    /// Clear the failure history of `item`.
    pub fn forget(&mut self, item: &K) {
        self.failures.remove(item);
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
