// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the corezone controller.
//!
//! All metrics carry the namespace prefix `corezone_`. They are observational only:
//! nothing in the dispatcher reads them back.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - reconcile passes by kind and outcome, and their duration
//! - **Queue Metrics** - rate-limited requeues and the current queue depth
//! - **Handler Metrics** - side-effect failures by kind and operation
//!
//! # Example
//!
//! ```rust,no_run
//! use corezone::metrics::{record_reconciliation, Outcome};
//!
//! record_reconciliation("Zone", Outcome::Synced, std::time::Duration::from_millis(3));
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all corezone metrics
const METRICS_NAMESPACE: &str = "corezone";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Terminal state of one reconcile pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The object exists and was handed to its handler
    Synced,
    /// A captured deletion was handed to its handler
    Deleted,
    /// A cache lookup failed and the key was requeued with backoff
    Retrying,
    /// The key was forgotten without any handler call
    Dropped,
    /// The pass failed after reaching a handler or the lister
    Failed,
}

impl Outcome {
    /// Label value of this outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Synced => "synced",
            Outcome::Deleted => "deleted",
            Outcome::Retrying => "retrying",
            Outcome::Dropped => "dropped",
            Outcome::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconcile passes by kind and outcome
///
/// Labels:
/// - `kind`: `Zone` or `Record`
/// - `outcome`: `synced`, `deleted`, `retrying`, `dropped`, `failed`
pub static RECONCILIATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconcile passes by kind and outcome",
    );
    let counter = CounterVec::new(opts, &["kind", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconcile passes in seconds
///
/// Labels:
/// - `kind`: `Zone` or `Record`
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconcile passes in seconds by kind",
    )
    .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Queue Metrics
// ============================================================================

/// Total number of rate-limited requeues
///
/// Labels:
/// - `kind`: `Zone` or `Record`
pub static REQUEUES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requeues_total"),
        "Total number of rate-limited requeues by kind",
    );
    let counter = CounterVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of keys waiting in the change queue
pub static QUEUE_DEPTH: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_queue_depth"),
        "Number of keys waiting in the change queue",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Handler Metrics
// ============================================================================

/// Total number of handler failures
///
/// Labels:
/// - `kind`: `Zone` or `Record`
/// - `operation`: `created` or `deleted`
pub static HANDLER_ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_handler_errors_total"),
        "Total number of handler failures by kind and operation",
    );
    let counter = CounterVec::new(opts, &["kind", "operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record the outcome of a reconcile pass
///
/// # Arguments
/// * `kind` - The kind of resource reconciled (e.g., `Zone`)
/// * `outcome` - How the pass ended
/// * `duration` - Duration of the pass
pub fn record_reconciliation(kind: &str, outcome: Outcome, duration: Duration) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[kind, outcome.as_str()])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a rate-limited requeue
pub fn record_requeue(kind: &str) {
    REQUEUES_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a handler failure
///
/// # Arguments
/// * `kind` - The kind of resource being handled
/// * `operation` - Handler callback that failed (`created`, `deleted`)
pub fn record_handler_error(kind: &str, operation: &str) {
    HANDLER_ERRORS_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
}

/// Publish the current queue depth
#[allow(clippy::cast_precision_loss)]
pub fn set_queue_depth(depth: usize) {
    QUEUE_DEPTH.set(depth as f64);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
