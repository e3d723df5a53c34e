// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the corezone controller.
//!
//! This module provides specialized error types for:
//! - Resource key parsing
//! - Observed state cache lookups
//! - Zone file materialization
//! - Reconcile passes, one variant per failure category
//!
//! Every reconcile failure is terminal for its pass except
//! [`ReconcileError::CacheLookupRetrying`], which marks a key that was put back on the
//! queue with backoff.

use crate::resource::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while building or splitting a `namespace/name` key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key is not of the form `namespace/name`
    #[error("invalid resource key '{key}': expected 'namespace/name'")]
    Malformed {
        /// The offending key
        key: String,
    },

    /// The object carries no name, so no key can be derived from it
    #[error("object has no metadata.name")]
    MissingName,

    /// The object carries no namespace; only namespaced resources are reconciled
    #[error("object '{name}' has no metadata.namespace")]
    MissingNamespace {
        /// Name of the object
        name: String,
    },
}

/// Errors returned by an observed state cache.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Looking up a single object failed
    #[error("failed to look up {kind} '{key}' in cache: {reason}")]
    Lookup {
        /// Kind of the cache that failed
        kind: ResourceKind,
        /// Key that was looked up
        key: String,
        /// Specific reason for the failure
        reason: String,
    },

    /// Listing objects of a namespace failed
    #[error("failed to list {kind} objects in namespace '{namespace}': {reason}")]
    List {
        /// Kind of the cache that failed
        kind: ResourceKind,
        /// Namespace being listed
        namespace: String,
        /// Specific reason for the failure
        reason: String,
    },
}

/// Errors raised by a handler while materializing or removing state.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// A filesystem operation on a zone file failed
    #[error("zone file operation on {} failed: {source}", .path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The zone template could not be compiled
    #[error("invalid zone template: {reason}")]
    Template {
        /// Parser message
        reason: String,
    },

    /// Rendering the template for a zone failed
    #[error("failed to render zone '{zone}': {reason}")]
    Render {
        /// Zone name being rendered
        zone: String,
        /// Renderer message
        reason: String,
    },

    /// The object handed to the handler cannot be addressed
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Outcome of a failed reconcile pass.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The queued key can never be parsed; dropped without retry
    #[error(transparent)]
    MalformedKey(KeyError),

    /// A cache lookup failed and the key was re-added with backoff
    #[error("failed processing item with key {key}, retrying (attempt {attempt}): {source}")]
    CacheLookupRetrying {
        /// Queued key
        key: String,
        /// Retry number just scheduled (1-based)
        attempt: u32,
        /// Cache failure
        #[source]
        source: CacheError,
    },

    /// A cache lookup failed and the retry budget is spent
    #[error("failed processing item with key {key} after {attempts} retries, giving up: {source}")]
    CacheLookupExhausted {
        /// Queued key
        key: String,
        /// Retries already consumed
        attempts: u32,
        /// Cache failure
        #[source]
        source: CacheError,
    },

    /// The object is gone from the cache and no tombstone was captured for it
    #[error("object with key {key} is gone and no tombstone was captured, deletion cannot be handled")]
    DeletionUnresolvable {
        /// Queued key
        key: String,
    },

    /// Listing sibling objects during conflict resolution failed
    #[error("failed listing siblings of {key}: {source}")]
    Listing {
        /// Queued key
        key: String,
        /// Cache failure
        #[source]
        source: CacheError,
    },

    /// The handler failed to apply a side effect
    #[error("handler failed for {key}: {source}")]
    Handler {
        /// Queued key
        key: String,
        /// Handler failure
        #[source]
        source: HandlerError,
    },
}

impl ReconcileError {
    /// Whether the key was put back on the queue for another attempt.
    #[must_use]
    pub fn is_retrying(&self) -> bool {
        matches!(self, ReconcileError::CacheLookupRetrying { .. })
    }

    /// Short, label-safe name of the failure category.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            ReconcileError::MalformedKey(_) => "malformed_key",
            ReconcileError::CacheLookupRetrying { .. } => "cache_lookup_retrying",
            ReconcileError::CacheLookupExhausted { .. } => "cache_lookup_exhausted",
            ReconcileError::DeletionUnresolvable { .. } => "deletion_unresolvable",
            ReconcileError::Listing { .. } => "listing",
            ReconcileError::Handler { .. } => "handler",
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
