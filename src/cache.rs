// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Observed state cache.
//!
//! The dispatcher reads remote objects through the [`ObjectCache`] trait: a read-only,
//! eventually-consistent view keyed by `namespace/name`. The production implementation,
//! [`ReflectorCache`], wraps a kube-rs reflector [`Store`] that the watch layer keeps
//! populated; tests substitute in-memory caches.
//!
//! A cache must not be trusted until [`ObjectCache::has_synced`] returns `true`: before
//! the initial listing has been seen, "not found" does not mean "deleted".

use crate::crd::LabelSelector;
use crate::errors::CacheError;
use crate::resource::{split_key, ResourceKind};
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Resource, ResourceExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read-only projection of remote objects of one kind.
pub trait ObjectCache<K>: Send + Sync {
    /// Look up an object by its `namespace/name` key.
    ///
    /// `Ok(None)` means the object is not currently known: either deleted or never synced.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Lookup`] if the lookup itself failed.
    fn get_by_key(&self, key: &str) -> Result<Option<Arc<K>>, CacheError>;

    /// List the objects in `namespace` whose labels match `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::List`] if the listing failed.
    fn list(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Arc<K>>, CacheError>;

    /// Whether the initial full listing has been observed.
    fn has_synced(&self) -> bool;
}

/// Shared "initial listing complete" flag, set by the watch layer.
#[derive(Clone, Debug, Default)]
pub struct SyncFlag(Arc<AtomicBool>);

impl SyncFlag {
    /// Create an unsynced flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the initial listing has been applied to the store.
    pub fn mark_synced(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`SyncFlag::mark_synced`] has been called.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// [`ObjectCache`] backed by a kube-rs reflector store.
#[derive(Clone)]
pub struct ReflectorCache<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    kind: ResourceKind,
    store: Store<K>,
    synced: SyncFlag,
}

impl<K> ReflectorCache<K>
where
    K: Resource<DynamicType = ()> + Clone + 'static,
{
    /// Wrap `store`; `synced` is flipped by whoever drives the reflector.
    #[must_use]
    pub fn new(kind: ResourceKind, store: Store<K>, synced: SyncFlag) -> Self {
        Self {
            kind,
            store,
            synced,
        }
    }

    /// Number of objects currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.state().len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> ObjectCache<K> for ReflectorCache<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    fn get_by_key(&self, key: &str) -> Result<Option<Arc<K>>, CacheError> {
        let (namespace, name) = split_key(key).map_err(|e| CacheError::Lookup {
            kind: self.kind,
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.store.get(&ObjectRef::new(name).within(namespace)))
    }

    fn list(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Arc<K>>, CacheError> {
        Ok(self
            .store
            .state()
            .into_iter()
            .filter(|obj| {
                obj.namespace().as_deref() == Some(namespace) && selector.matches(obj.labels())
            })
            .collect())
    }

    fn has_synced(&self) -> bool {
        self.synced.is_synced()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
