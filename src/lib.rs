// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # corezone - CoreDNS zone controller for Kubernetes
//!
//! corezone watches `Zone` and `Record` custom resources and materializes every zone as a
//! file in a directory served by CoreDNS.
//!
//! ## Overview
//!
//! The reconciliation engine is built from four pieces:
//!
//! - a deduplicating, rate-limited change queue ([`queue`], [`retry`])
//! - an observed state cache fed by kube-rs reflectors ([`cache`], [`watch`])
//! - a deletion tombstone index ([`tombstone`])
//! - a dispatcher that resolves conflicting zone claims and calls idempotent handlers
//!   ([`controller`], [`handler`])
//!
//! When several zones in a namespace declare the same `zoneName`, the one with the
//! earliest `creationTimestamp` is materialized.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`resource`] - Resource keys and the typed object payload
//! - [`controller`] - The reconcile dispatcher
//! - [`handler`] - Zone file and record handlers
//! - [`template`] - Zone template rendering
//! - [`context`] - Explicit dispatcher context
//! - [`config`] - Command-line and environment configuration
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use corezone::crd::{Zone, ZoneSpec};
//!
//! let zone = Zone::new(
//!     "example-com",
//!     ZoneSpec {
//!         zone_name: "example.com".to_string(),
//!     },
//! );
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod context;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod handler;
pub mod metrics;
pub mod queue;
pub mod resource;
pub mod retry;
pub mod selector;
pub mod template;
pub mod tombstone;
pub mod watch;
