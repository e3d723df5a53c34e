// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch layer.
//!
//! One [`Watch`] per kind lists and watches the API server, keeps a reflector store (the
//! observed state cache) up to date and turns every change into a [`WatchEvent`] on an
//! mpsc channel. The watch tasks never touch the work queue or the tombstone index: the
//! dispatcher owns both and applies the events it receives.
//!
//! Events are emitted only after the store reflects them, so when the dispatcher looks
//! up an `Applied` key it sees the new object, and when it looks up a `Deleted` key the
//! object is already gone.
//!
//! # Relists
//!
//! After a watch desync the watcher lists everything again (`Init`, `InitApply`...,
//! `InitDone`). The store swaps in the new listing atomically at `InitDone`, so keys seen
//! during the relist are held back until then. Objects that were known before the relist
//! but are missing from it are reported as `Deleted` with their last known snapshot.

use crate::cache::{ReflectorCache, SyncFlag};
use crate::crd::{Record, Zone};
use crate::resource::{object_key, DnsObject, ResourceKey, ResourceKind};
use anyhow::Result;
use futures::StreamExt;
use kube::runtime::reflector::{self, store::Writer};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// A change observed by the watch layer.
#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent {
    /// The object behind this key was created or updated
    Applied(ResourceKey),
    /// The object was deleted; carries its last known state
    Deleted(DnsObject),
}

/// A custom resource the controller watches.
pub trait WatchedResource:
    Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static
{
    /// Kind tag used for queue keys.
    const KIND: ResourceKind;

    /// Wrap a snapshot into the typed payload.
    fn into_dns_object(obj: Arc<Self>) -> DnsObject;
}

impl WatchedResource for Zone {
    const KIND: ResourceKind = ResourceKind::Zone;

    fn into_dns_object(obj: Arc<Self>) -> DnsObject {
        DnsObject::Zone(obj)
    }
}

impl WatchedResource for Record {
    const KIND: ResourceKind = ResourceKind::Record;

    fn into_dns_object(obj: Arc<Self>) -> DnsObject {
        DnsObject::Record(obj)
    }
}

/// Translates raw watcher events into [`WatchEvent`]s.
///
/// Remembers the last known snapshot of every object so deletions discovered by a relist
/// can still carry the object.
#[derive(Debug)]
pub struct EventTranslator<K> {
    known: HashMap<String, Arc<K>>,
    relist: Option<Vec<(String, Arc<K>)>>,
}

impl<K> Default for EventTranslator<K> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            relist: None,
        }
    }
}

impl<K: WatchedResource> EventTranslator<K> {
    /// Create a translator that knows no objects yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently known.
    #[must_use]
    pub fn known(&self) -> usize {
        self.known.len()
    }

    /// Translate one watcher event. The store must already have applied it.
    pub fn translate(&mut self, event: &watcher::Event<K>) -> Vec<WatchEvent> {
        match event {
            watcher::Event::Apply(obj) => match Self::key_of(obj) {
                Some(key) => {
                    self.known.insert(key.clone(), Arc::new(obj.clone()));
                    vec![WatchEvent::Applied(ResourceKey::new(key, K::KIND))]
                }
                None => Vec::new(),
            },
            watcher::Event::Delete(obj) => match Self::key_of(obj) {
                Some(key) => {
                    self.known.remove(&key);
                    vec![WatchEvent::Deleted(K::into_dns_object(Arc::new(obj.clone())))]
                }
                None => Vec::new(),
            },
            watcher::Event::Init => {
                self.relist = Some(Vec::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(key) = Self::key_of(obj) {
                    self.relist
                        .get_or_insert_with(Vec::new)
                        .push((key, Arc::new(obj.clone())));
                }
                Vec::new()
            }
            watcher::Event::InitDone => self.finish_relist(),
        }
    }

    fn finish_relist(&mut self) -> Vec<WatchEvent> {
        let listed = self.relist.take().unwrap_or_default();
        let listed_keys: HashSet<&str> = listed.iter().map(|(key, _)| key.as_str()).collect();

        let mut events: Vec<WatchEvent> = self
            .known
            .iter()
            .filter(|(key, _)| !listed_keys.contains(key.as_str()))
            .map(|(_, obj)| WatchEvent::Deleted(K::into_dns_object(Arc::clone(obj))))
            .collect();
        if !events.is_empty() {
            info!(
                kind = %K::KIND,
                count = events.len(),
                "Objects disappeared during relist"
            );
        }

        self.known.clear();
        for (key, obj) in listed {
            events.push(WatchEvent::Applied(ResourceKey::new(key.clone(), K::KIND)));
            self.known.insert(key, obj);
        }
        events
    }

    fn key_of(obj: &K) -> Option<String> {
        match object_key(obj) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(kind = %K::KIND, error = %e, "Ignoring watch event for unaddressable object");
                None
            }
        }
    }
}

/// List/watch source for one kind.
pub struct Watch<K>
where
    K: WatchedResource,
{
    api: Api<K>,
    writer: Writer<K>,
    synced: SyncFlag,
}

impl<K: WatchedResource> Watch<K> {
    /// Create a watch over `api` together with the cache it populates.
    #[must_use]
    pub fn new(api: Api<K>) -> (Self, ReflectorCache<K>) {
        let (store, writer) = reflector::store::<K>();
        let synced = SyncFlag::new();
        let cache = ReflectorCache::new(K::KIND, store, synced.clone());
        (
            Self {
                api,
                writer,
                synced,
            },
            cache,
        )
    }

    /// Watch until `stop` flips to `true` or the dispatcher hangs up.
    ///
    /// Watch errors are logged and retried with the watcher's default backoff.
    ///
    /// # Errors
    ///
    /// Currently never fails; the `Result` keeps the task signature uniform with the
    /// other long-running tasks in `main`.
    pub async fn run(
        self,
        events: mpsc::Sender<WatchEvent>,
        mut stop: watch::Receiver<bool>,
    ) -> Result<()> {
        let Self {
            api,
            mut writer,
            synced,
        } = self;
        let mut translator = EventTranslator::<K>::new();
        let mut stream = pin!(watcher(api, watcher::Config::default()).default_backoff());

        info!(kind = %K::KIND, "Starting watch");
        if *stop.borrow() {
            return Ok(());
        }
        loop {
            let item = tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
                item = stream.next() => item,
            };
            let Some(item) = item else {
                warn!(kind = %K::KIND, "Watch stream ended");
                break;
            };

            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    warn!(kind = %K::KIND, error = %e, "Watch stream error, backing off");
                    continue;
                }
            };

            writer.apply_watcher_event(&event);
            let translated = translator.translate(&event);
            if matches!(event, watcher::Event::InitDone) && !synced.is_synced() {
                synced.mark_synced();
                info!(kind = %K::KIND, objects = translator.known(), "Initial listing synced");
            }

            for out in translated {
                debug!(kind = %K::KIND, event = ?out, "Forwarding watch event");
                if events.send(out).await.is_err() {
                    info!(kind = %K::KIND, "Dispatcher is gone, stopping watch");
                    return Ok(());
                }
            }
        }

        info!(kind = %K::KIND, "Watch stopped");
        Ok(())
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod watch_tests;
