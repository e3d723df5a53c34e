// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for DNS management.
//!
//! # Resource Types
//!
//! - [`Zone`] - Declares a DNS zone to be materialized as a CoreDNS zone file
//! - [`Record`] - Declares a DNS record belonging to a zone (tracked, not yet materialized)
//!
//! # Example: Declaring a Zone
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

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label selector to match Kubernetes resources.
///
/// A label selector is a label query over a set of resources. The result of matchLabels and
/// matchExpressions are `ANDed`. An empty label selector matches all objects.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of {key,value} pairs. A single {key,value} in the matchLabels map is equivalent
    /// to an element of matchExpressions, whose key field is "key", the operator is "In",
    /// and the values array contains only "value". All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// List of label selector requirements. All requirements must be satisfied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// A label selector requirement is a selector that contains values, a key, and an operator
/// that relates the key and values.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct LabelSelectorRequirement {
    /// The label key that the selector applies to.
    pub key: String,

    /// Operator represents a key's relationship to a set of values.
    /// Valid operators are In, `NotIn`, Exists and `DoesNotExist`.
    pub operator: String,

    /// An array of string values. If the operator is In or `NotIn`,
    /// the values array must be non-empty. If the operator is Exists or `DoesNotExist`,
    /// the values array must be empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// `Zone` declares a DNS zone served by CoreDNS.
///
/// Several `Zone` objects in one namespace may declare the same `zoneName`. Only one of
/// them, the oldest, is materialized; the others are superseded.
///
/// # Example
///
/// ```yaml
/// apiVersion: corezone.io/v1
/// kind: Zone
/// metadata:
///   name: example-com
///   namespace: dns-system
/// spec:
///   zoneName: example.com
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[kube(
    group = "corezone.io",
    version = "v1",
    kind = "Zone",
    namespaced,
    derive = "PartialEq",
    doc = "Zone declares a DNS zone that the controller renders into a CoreDNS zone file. When several Zones in a namespace declare the same zoneName, the oldest one wins."
)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSpec {
    /// DNS zone name as seen by clients (e.g., "example.com").
    #[schemars(regex(
        pattern = r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$"
    ))]
    pub zone_name: String,
}

/// `Record` declares a DNS record inside a zone.
///
/// The association with a zone is advisory: records are watched and tracked, but no
/// file-system state is produced for them yet.
///
/// # Example
///
/// ```yaml
/// apiVersion: corezone.io/v1
/// kind: Record
/// metadata:
///   name: www-example-com
///   namespace: dns-system
/// spec:
///   zoneName: example.com
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[kube(
    group = "corezone.io",
    version = "v1",
    kind = "Record",
    namespaced,
    derive = "PartialEq",
    doc = "Record declares a DNS record belonging to the zone named by zoneName."
)]
#[serde(rename_all = "camelCase")]
pub struct RecordSpec {
    /// Name of the zone this record belongs to (e.g., "example.com").
    pub zone_name: String,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
