// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Deletion tombstone index.
//!
//! Once a delete notification has been applied, the observed state cache no longer holds
//! the object, but the deletion handler still needs its last known state. The index keeps
//! that snapshot from the moment the delete event is received until the dispatcher has
//! handled the deletion.
//!
//! The index is owned by the dispatcher task and mutated only from there (delete events
//! reach it through the watch event channel), so it needs no internal locking.

use crate::errors::KeyError;
use crate::resource::{DnsObject, ResourceKey};
use std::collections::HashMap;

/// Last known snapshots of deleted objects, keyed by queue key.
#[derive(Debug, Default)]
pub struct TombstoneIndex {
    entries: HashMap<ResourceKey, DnsObject>,
}

impl TombstoneIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the final snapshot of a deleted object, replacing any older snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if no key can be derived from the object.
    pub fn add(&mut self, object: DnsObject) -> Result<ResourceKey, KeyError> {
        let key = object.key()?;
        self.entries.insert(key.clone(), object);
        Ok(key)
    }

    /// Snapshot captured for `key`, if any.
    #[must_use]
    pub fn get_by_key(&self, key: &ResourceKey) -> Option<&DnsObject> {
        self.entries.get(key)
    }

    /// Erase the snapshot for `key`. Erasing an absent key is a no-op.
    pub fn delete(&mut self, key: &ResourceKey) -> Option<DnsObject> {
        self.entries.remove(key)
    }

    /// Number of deletions captured but not yet handled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no deletion is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "tombstone_tests.rs"]
mod tombstone_tests;
