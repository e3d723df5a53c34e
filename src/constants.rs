// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the corezone controller.
//!
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all corezone CRDs
pub const API_GROUP: &str = "corezone.io";

/// API version for all corezone CRDs
pub const API_VERSION: &str = "v1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "corezone.io/v1";

/// Kind name for `Zone` resource
pub const KIND_ZONE: &str = "Zone";

/// Kind name for `Record` resource
pub const KIND_RECORD: &str = "Record";

// ============================================================================
// Queue and Retry Constants
// ============================================================================

/// Number of rate-limited retries a cache lookup failure gets before the key is forgotten
pub const MAX_CACHE_LOOKUP_REQUEUES: u32 = 5;

/// First backoff delay handed out by the per-item rate limiter (5ms)
pub const QUEUE_BASE_DELAY_MILLIS: u64 = 5;

/// Ceiling on the per-item backoff delay (1000 seconds)
pub const QUEUE_MAX_DELAY_SECS: u64 = 1000;

/// Growth factor between consecutive per-item backoff delays
pub const QUEUE_BACKOFF_MULTIPLIER: f64 = 2.0;

// ============================================================================
// Controller Constants
// ============================================================================

/// How often the initial cache synchronization barrier re-checks `has_synced`
pub const CACHE_SYNC_POLL_MILLIS: u64 = 100;

/// Default capacity of the watch event channel
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Zone File Constants
// ============================================================================

/// Default directory where zone files are written
pub const DEFAULT_ZONE_DIR: &str = "/tmp/zones/";

/// Name under which the zone template is registered with the renderer
pub const ZONE_TEMPLATE_NAME: &str = "coredns.tmpl";

/// Extension of every materialized zone file
pub const ZONE_FILE_EXTENSION: &str = "zone";

/// Separator between namespace and name in a zone file name.
///
/// `_` is not a valid character in Kubernetes object names, so the pair
/// `namespace_name` is always unambiguous.
pub const ZONE_FILE_SEPARATOR: char = '_';

// ============================================================================
// Metrics Constants
// ============================================================================

/// Default bind address for the Prometheus metrics endpoint
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// HTTP path serving Prometheus metrics
pub const METRICS_PATH: &str = "/metrics";
