// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the reconcile dispatcher.
//!
//! Everything the dispatcher touches is reached through an explicit [`Context`]:
//! - Observed state caches for both CRD types
//! - The change queue
//! - The handler table
//!
//! Nothing here is process-global. Tests build a `Context` from in-memory caches and
//! recording handlers; `main` builds one from reflector-backed caches.

use crate::cache::ObjectCache;
use crate::crd::{Record, Zone};
use crate::handler::Handlers;
use crate::queue::WorkQueue;
use crate::resource::ResourceKey;
use std::sync::Arc;

/// Shared context passed to the dispatcher.
#[derive(Clone)]
pub struct Context {
    /// Observed state of `Zone` objects
    pub zones: Arc<dyn ObjectCache<Zone>>,

    /// Observed state of `Record` objects
    pub records: Arc<dyn ObjectCache<Record>>,

    /// Change queue fed by the watch layer
    pub queue: WorkQueue<ResourceKey>,

    /// Side-effect handlers keyed by kind
    pub handlers: Handlers,
}

impl Context {
    /// Bundle caches, queue and handlers.
    pub fn new(
        zones: Arc<dyn ObjectCache<Zone>>,
        records: Arc<dyn ObjectCache<Record>>,
        queue: WorkQueue<ResourceKey>,
        handlers: Handlers,
    ) -> Self {
        Self {
            zones,
            records,
            queue,
            handlers,
        }
    }

    /// Whether every watched kind has completed its initial listing.
    #[must_use]
    pub fn caches_synced(&self) -> bool {
        self.zones.has_synced() && self.records.has_synced()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
