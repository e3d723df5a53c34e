// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource identity shared by the queue, caches, tombstones and handlers.
//!
//! A [`ResourceKey`] is the unit of queueing and deduplication: a `namespace/name`
//! string tagged with the [`ResourceKind`] it refers to. A [`DnsObject`] is the typed
//! payload handed between the watch layer, the tombstone index and the handlers, so no
//! component ever needs to downcast an opaque object.

use crate::constants::{KIND_RECORD, KIND_ZONE};
use crate::crd::{Record, Zone};
use crate::errors::KeyError;
use kube::{Resource, ResourceExt};
use std::fmt;
use std::sync::Arc;

/// The kinds of resource the controller reconciles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// A `Zone` custom resource
    Zone,
    /// A `Record` custom resource
    Record,
}

impl ResourceKind {
    /// Kubernetes kind name of this resource type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Zone => KIND_ZONE,
            ResourceKind::Record => KIND_RECORD,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one queued resource: `namespace/name` plus its kind.
///
/// Immutable once created. Two keys are equal only if both the string and the kind
/// match, so a `Zone` and a `Record` with the same name never coalesce in the queue.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    key: String,
    kind: ResourceKind,
}

impl ResourceKey {
    /// Create a key from a raw `namespace/name` string.
    ///
    /// The string is not validated here; a malformed key is detected (and dropped) when
    /// the dispatcher processes it.
    pub fn new(key: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            key: key.into(),
            kind,
        }
    }

    /// Build the key of a namespaced object.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the object has no name or no namespace.
    pub fn for_object<K: Resource>(obj: &K, kind: ResourceKind) -> Result<Self, KeyError> {
        Ok(Self::new(object_key(obj)?, kind))
    }

    /// The raw `namespace/name` string.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The kind this key refers to.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Split into `(namespace, name)`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Malformed`] if the key is not `namespace/name`.
    pub fn split(&self) -> Result<(&str, &str), KeyError> {
        split_key(&self.key)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

/// Split a `namespace/name` key.
///
/// Exactly one `/` is required and both halves must be non-empty. Cluster-scoped keys
/// (a bare `name`) are rejected because both reconciled kinds are namespaced.
///
/// # Errors
///
/// Returns [`KeyError::Malformed`] for any other shape.
pub fn split_key(key: &str) -> Result<(&str, &str), KeyError> {
    match key.split_once('/') {
        Some((namespace, name))
            if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((namespace, name))
        }
        _ => Err(KeyError::Malformed {
            key: key.to_string(),
        }),
    }
}

/// Compute the `namespace/name` key of a namespaced object.
///
/// # Errors
///
/// Returns [`KeyError`] if the object has no name or no namespace.
pub fn object_key<K: Resource>(obj: &K) -> Result<String, KeyError> {
    let name = obj.meta().name.as_deref().ok_or(KeyError::MissingName)?;
    let namespace = obj
        .namespace()
        .ok_or_else(|| KeyError::MissingNamespace {
            name: name.to_string(),
        })?;
    Ok(format!("{namespace}/{name}"))
}

/// Typed snapshot of a reconciled object.
#[derive(Clone, Debug, PartialEq)]
pub enum DnsObject {
    /// A `Zone` snapshot
    Zone(Arc<Zone>),
    /// A `Record` snapshot
    Record(Arc<Record>),
}

impl DnsObject {
    /// The kind of the wrapped object.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            DnsObject::Zone(_) => ResourceKind::Zone,
            DnsObject::Record(_) => ResourceKind::Record,
        }
    }

    /// The queue key of the wrapped object.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the object has no name or no namespace.
    pub fn key(&self) -> Result<ResourceKey, KeyError> {
        match self {
            DnsObject::Zone(zone) => ResourceKey::for_object(zone.as_ref(), ResourceKind::Zone),
            DnsObject::Record(record) => {
                ResourceKey::for_object(record.as_ref(), ResourceKind::Record)
            }
        }
    }

    /// The `spec.zoneName` declared by the wrapped object.
    #[must_use]
    pub fn zone_name(&self) -> &str {
        match self {
            DnsObject::Zone(zone) => &zone.spec.zone_name,
            DnsObject::Record(record) => &record.spec.zone_name,
        }
    }
}

impl From<Zone> for DnsObject {
    fn from(zone: Zone) -> Self {
        DnsObject::Zone(Arc::new(zone))
    }
}

impl From<Record> for DnsObject {
    fn from(record: Record) -> Self {
        DnsObject::Record(Arc::new(record))
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod resource_tests;
