// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconcile dispatcher.
//!
//! The [`Controller`] is the single consumer of the change queue. Each pass pulls one
//! key and moves it through
//! `Dequeued -> Classified(kind) -> Resolved(exists | deleted) -> Dispatched`, ending with
//! the key either forgotten or requeued with backoff:
//!
//! 1. A key that is not `namespace/name` is forgotten without retry.
//! 2. The object is looked up in the cache of its kind. Lookup errors are retried with
//!    backoff up to [`MAX_CACHE_LOOKUP_REQUEUES`] times, then forgotten.
//! 3. An object missing from the cache is a deletion. Its tombstone is handed to the
//!    handler and erased; without a tombstone the key is dropped.
//! 4. An existing zone is resolved against the other zones of its namespace declaring
//!    the same `zoneName`, and only the canonical (oldest) one is materialized. What was
//!    materialized for the losing claimants is removed. An existing record is only logged.
//!    A tombstone still pending for an object that was re-created is consumed first.
//!
//! Handler and listing failures end the pass; the key is forgotten, never requeued.
//!
//! The dispatcher also owns the [`TombstoneIndex`]. Delete events from the watch layer
//! reach it through [`Controller::observe`], which captures the tombstone before the key
//! is enqueued.

use crate::constants::{CACHE_SYNC_POLL_MILLIS, MAX_CACHE_LOOKUP_REQUEUES};
use crate::context::Context;
use crate::crd::{LabelSelector, Zone};
use crate::errors::{CacheError, HandlerError, ReconcileError};
use crate::metrics::{self, Outcome};
use crate::resource::{DnsObject, ResourceKey, ResourceKind};
use crate::tombstone::TombstoneIndex;
use crate::watch::WatchEvent;
use anyhow::{bail, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// The reconcile dispatcher.
pub struct Controller {
    ctx: Context,
    tombstones: TombstoneIndex,
}

impl Controller {
    /// Create a dispatcher over `ctx` with an empty tombstone index.
    #[must_use]
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            tombstones: TombstoneIndex::new(),
        }
    }

    /// The dispatcher's context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Deletions captured but not yet handled.
    #[must_use]
    pub fn tombstones(&self) -> &TombstoneIndex {
        &self.tombstones
    }

    /// Apply one event from the watch layer.
    ///
    /// `Applied` enqueues the key. `Deleted` first records the snapshot as a tombstone,
    /// then enqueues its key.
    pub fn observe(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Applied(key) => {
                debug!(key = %key, "Object applied, enqueueing");
                self.ctx.queue.add(key);
            }
            WatchEvent::Deleted(object) => match self.tombstones.add(object) {
                Ok(key) => {
                    debug!(key = %key, "Object deleted, tombstone captured");
                    self.ctx.queue.add(key);
                }
                Err(e) => warn!(error = %e, "Dropping delete event for unaddressable object"),
            },
        }
        metrics::set_queue_depth(self.ctx.queue.len());
    }

    /// Block until every cache has completed its initial listing.
    ///
    /// Events received while waiting are applied so nothing is lost. The caches are
    /// polled every [`CACHE_SYNC_POLL_MILLIS`] milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the stop signal fires before the caches are synced.
    pub async fn wait_for_cache_sync(
        &mut self,
        events: &mut mpsc::Receiver<WatchEvent>,
        stop: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(Duration::from_millis(CACHE_SYNC_POLL_MILLIS));
        info!("Waiting for caches to sync");
        loop {
            if *stop.borrow() {
                bail!("error syncing cache: stopped before the initial listing completed");
            }
            if self.ctx.caches_synced() {
                info!("Caches synced");
                return Ok(());
            }
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        bail!("error syncing cache: stop signal dropped before the initial listing completed");
                    }
                }
                Some(event) = events.recv() => self.observe(event),
                _ = ticker.tick() => {}
            }
        }
    }

    /// Run the dispatcher until stopped.
    ///
    /// Waits for the caches, then serves watch events and queued keys one at a time.
    /// When `stop` flips to `true` the queue is shut down, the keys still waiting are
    /// processed and the method returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the stop signal fires before the initial sync. Failures of
    /// individual passes are logged and never end the loop.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<WatchEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<()> {
        self.wait_for_cache_sync(&mut events, &mut stop).await?;
        info!("Controller started");

        let queue = self.ctx.queue.clone();
        let mut stopping = false;
        let mut events_open = true;
        loop {
            tokio::select! {
                biased;

                changed = stop.changed(), if !stopping => {
                    if changed.is_err() || *stop.borrow() {
                        info!(pending = queue.len(), "Stop requested, draining queue");
                        stopping = true;
                        queue.shut_down();
                    }
                }
                event = events.recv(), if events_open && !stopping => match event {
                    Some(event) => self.observe(event),
                    None => {
                        warn!("Watch event channel closed");
                        events_open = false;
                    }
                },
                key = queue.get() => match key {
                    Some(key) => {
                        // Failures are already logged and counted
                        let _ = self.process_next_item(&key).await;
                    }
                    None => break,
                },
            }
        }

        info!("Controller stopped");
        Ok(())
    }

    /// Run one reconcile pass for `key`, which must have been handed out by the queue.
    ///
    /// Always marks the key done, so a re-add that arrived during the pass is scheduled
    /// afterward.
    ///
    /// # Errors
    ///
    /// Returns the [`ReconcileError`] that ended the pass.
    pub async fn process_next_item(
        &mut self,
        key: &ResourceKey,
    ) -> Result<Outcome, ReconcileError> {
        let span = info_span!("reconcile", key = %key.key(), kind = %key.kind());
        async {
            let start = Instant::now();
            let result = self.reconcile(key).await;
            self.ctx.queue.done(key);

            let outcome = match &result {
                Ok(outcome) => {
                    info!(outcome = %outcome, "Successfully synced");
                    *outcome
                }
                Err(e) if e.is_retrying() => {
                    warn!(error = %e, "Reconcile failed, retrying");
                    Outcome::Retrying
                }
                Err(e) => {
                    error!(error = %e, category = e.category(), "Reconcile failed");
                    match e {
                        ReconcileError::Listing { .. } | ReconcileError::Handler { .. } => {
                            Outcome::Failed
                        }
                        _ => Outcome::Dropped,
                    }
                }
            };
            metrics::record_reconciliation(key.kind().as_str(), outcome, start.elapsed());
            metrics::set_queue_depth(self.ctx.queue.len());
            result
        }
        .instrument(span)
        .await
    }

    async fn reconcile(&mut self, key: &ResourceKey) -> Result<Outcome, ReconcileError> {
        let namespace = match key.split() {
            Ok((namespace, _)) => namespace,
            Err(e) => {
                self.ctx.queue.forget(key);
                return Err(ReconcileError::MalformedKey(e));
            }
        };

        match key.kind() {
            ResourceKind::Zone => self.sync_zone(key, namespace).await,
            ResourceKind::Record => self.sync_record(key, namespace).await,
        }
    }

    async fn sync_zone(
        &mut self,
        key: &ResourceKey,
        namespace: &str,
    ) -> Result<Outcome, ReconcileError> {
        let zone = match self.ctx.zones.get_by_key(key.key()) {
            Ok(zone) => zone,
            Err(e) => return Err(self.lookup_failed(key, e)),
        };
        let Some(zone) = zone else {
            return self.handle_deletion(key).await;
        };
        self.settle_recreated(key, &zone.spec.zone_name).await?;

        let zones = self.list_or_forget(key, || {
            self.ctx.zones.list(namespace, &LabelSelector::default())
        })?;
        let canonical = resolve_canonical_zone(&zone, &zones);
        if canonical.name_any() != zone.name_any() {
            info!(
                zone_name = %zone.spec.zone_name,
                canonical = %canonical.name_any(),
                "Zone name already claimed by an older zone"
            );
        }

        let created = self
            .ctx
            .handlers
            .object_created(&DnsObject::Zone(Arc::clone(&canonical)))
            .await;
        if created.is_err() {
            self.ctx.queue.forget(key);
            return self.handler_result(key, "created", created, Outcome::Synced);
        }

        let retired = self.retire_superseded(&zone, &canonical, &zones).await;
        self.ctx.queue.forget(key);
        self.handler_result(key, "deleted", retired, Outcome::Synced)
    }

    async fn sync_record(
        &mut self,
        key: &ResourceKey,
        namespace: &str,
    ) -> Result<Outcome, ReconcileError> {
        let record = match self.ctx.records.get_by_key(key.key()) {
            Ok(record) => record,
            Err(e) => return Err(self.lookup_failed(key, e)),
        };
        let Some(record) = record else {
            return self.handle_deletion(key).await;
        };
        self.settle_recreated(key, &record.spec.zone_name).await?;

        let records = self.list_or_forget(key, || {
            self.ctx.records.list(namespace, &LabelSelector::default())
        })?;
        let siblings: Vec<String> = records
            .iter()
            .filter(|other| {
                other.spec.zone_name == record.spec.zone_name
                    && other.name_any() != record.name_any()
            })
            .map(|other| other.name_any())
            .collect();
        info!(
            zone_name = %record.spec.zone_name,
            siblings = ?siblings,
            "Record observed"
        );

        self.ctx.queue.forget(key);
        Ok(Outcome::Synced)
    }

    async fn handle_deletion(&mut self, key: &ResourceKey) -> Result<Outcome, ReconcileError> {
        let Some(snapshot) = self.tombstones.get_by_key(key).cloned() else {
            self.tombstones.delete(key);
            self.ctx.queue.forget(key);
            return Err(ReconcileError::DeletionUnresolvable {
                key: key.key().to_string(),
            });
        };

        info!("Object deletion detected");
        let result = self.ctx.handlers.object_deleted(&snapshot).await;
        self.tombstones.delete(key);
        self.ctx.queue.forget(key);

        if let DnsObject::Zone(zone) = &snapshot {
            self.requeue_zone_claimants(zone);
        }
        self.handler_result(key, "deleted", result, Outcome::Deleted)
    }

    /// Consume a deletion whose object was re-created before the pass ran.
    ///
    /// The snapshot still gets its single `object_deleted` call and is erased. A zone that
    /// came back under another `zoneName` hands the old name to its claimants.
    async fn settle_recreated(
        &mut self,
        key: &ResourceKey,
        zone_name: &str,
    ) -> Result<(), ReconcileError> {
        let Some(snapshot) = self.tombstones.delete(key) else {
            return Ok(());
        };

        info!("Object re-created before its deletion was handled");
        let result = self.ctx.handlers.object_deleted(&snapshot).await;
        if let DnsObject::Zone(old) = &snapshot {
            if old.spec.zone_name != zone_name {
                self.requeue_zone_claimants(old);
            }
        }
        self.handler_result(key, "deleted", result, Outcome::Deleted)
            .map(|_| ())
            .map_err(|e| {
                self.ctx.queue.forget(key);
                e
            })
    }

    /// Remove what was materialized for zones that lost the claim on `zone`'s name.
    async fn retire_superseded(
        &self,
        zone: &Arc<Zone>,
        canonical: &Zone,
        zones: &[Arc<Zone>],
    ) -> Result<(), HandlerError> {
        let canonical_name = canonical.name_any();
        let mut losers: Vec<&Arc<Zone>> = zones
            .iter()
            .filter(|other| {
                other.spec.zone_name == zone.spec.zone_name && other.name_any() != canonical_name
            })
            .collect();
        if zone.name_any() != canonical_name
            && !losers.iter().any(|other| other.name_any() == zone.name_any())
        {
            losers.push(zone);
        }

        for loser in losers {
            debug!(
                zone = %loser.name_any(),
                canonical = %canonical_name,
                "Retiring superseded zone"
            );
            self.ctx
                .handlers
                .object_deleted(&DnsObject::Zone(Arc::clone(loser)))
                .await?;
        }
        Ok(())
    }

    /// Re-add the remaining zones claiming the deleted zone's name so the next canonical
    /// zone gets materialized.
    fn requeue_zone_claimants(&self, deleted: &Zone) {
        let Some(namespace) = deleted.namespace() else {
            return;
        };
        let zones = match self.ctx.zones.list(&namespace, &LabelSelector::default()) {
            Ok(zones) => zones,
            Err(e) => {
                warn!(error = %e, "Cannot list zones to hand over deleted zone name");
                return;
            }
        };
        for zone in zones.iter().filter(|z| {
            z.spec.zone_name == deleted.spec.zone_name && z.name_any() != deleted.name_any()
        }) {
            match ResourceKey::for_object(zone.as_ref(), ResourceKind::Zone) {
                Ok(claimant) => {
                    info!(
                        claimant = %claimant,
                        zone_name = %zone.spec.zone_name,
                        "Handing over zone name"
                    );
                    self.ctx.queue.add(claimant);
                }
                Err(e) => warn!(error = %e, "Skipping unaddressable zone"),
            }
        }
    }

    fn lookup_failed(&self, key: &ResourceKey, source: CacheError) -> ReconcileError {
        let attempts = self.ctx.queue.num_requeues(key);
        if attempts < MAX_CACHE_LOOKUP_REQUEUES {
            self.ctx.queue.add_rate_limited(key.clone());
            metrics::record_requeue(key.kind().as_str());
            ReconcileError::CacheLookupRetrying {
                key: key.key().to_string(),
                attempt: attempts + 1,
                source,
            }
        } else {
            self.ctx.queue.forget(key);
            ReconcileError::CacheLookupExhausted {
                key: key.key().to_string(),
                attempts,
                source,
            }
        }
    }

    fn list_or_forget<T>(
        &self,
        key: &ResourceKey,
        list: impl FnOnce() -> Result<Vec<T>, CacheError>,
    ) -> Result<Vec<T>, ReconcileError> {
        list().map_err(|source| {
            self.ctx.queue.forget(key);
            ReconcileError::Listing {
                key: key.key().to_string(),
                source,
            }
        })
    }

    fn handler_result(
        &self,
        key: &ResourceKey,
        operation: &str,
        result: Result<(), HandlerError>,
        outcome: Outcome,
    ) -> Result<Outcome, ReconcileError> {
        result.map(|()| outcome).map_err(|source| {
            metrics::record_handler_error(key.kind().as_str(), operation);
            ReconcileError::Handler {
                key: key.key().to_string(),
                source,
            }
        })
    }
}

/// Pick the zone to materialize for `zone`'s `zoneName`.
///
/// Candidates are `zone` and every entry of `zones` declaring the same `zoneName` under a
/// different name. The oldest `creationTimestamp` wins; equal timestamps go to the
/// lexicographically smaller name, and a zone without a timestamp loses to any zone that
/// has one.
#[must_use]
pub fn resolve_canonical_zone(zone: &Arc<Zone>, zones: &[Arc<Zone>]) -> Arc<Zone> {
    let name = zone.name_any();
    zones
        .iter()
        .filter(|other| other.spec.zone_name == zone.spec.zone_name && other.name_any() != name)
        .chain(std::iter::once(zone))
        .min_by(|a, b| canonical_order(a).cmp(&canonical_order(b)))
        .map_or_else(|| Arc::clone(zone), Arc::clone)
}

fn canonical_order(zone: &Zone) -> (bool, Option<Time>, String) {
    let created = zone.creation_timestamp();
    (created.is_none(), created, zone.name_any())
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
