// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector matching for namespace listings.
//!
//! The dispatcher lists the siblings of a reconciled object through
//! [`ObjectCache::list`](crate::cache::ObjectCache::list), which filters by a
//! [`LabelSelector`]. An empty selector matches everything.

use crate::crd::{LabelSelector, LabelSelectorRequirement};
use std::collections::BTreeMap;

impl LabelSelector {
    /// Check whether a set of labels satisfies this selector.
    ///
    /// `matchLabels` and `matchExpressions` are `ANDed`. An unknown operator never
    /// matches, so a typo cannot silently widen a selection.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let labels_match = self.match_labels.as_ref().is_none_or(|wanted| {
            wanted
                .iter()
                .all(|(key, value)| labels.get(key) == Some(value))
        });

        labels_match
            && self
                .match_expressions
                .as_ref()
                .is_none_or(|exprs| exprs.iter().all(|expr| expr.matches(labels)))
    }

    /// Whether the selector places no constraint at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.match_labels.as_ref().is_none_or(BTreeMap::is_empty)
            && self.match_expressions.as_ref().is_none_or(Vec::is_empty)
    }
}

impl LabelSelectorRequirement {
    /// Evaluate one requirement against a set of labels.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let values = self.values.as_deref().unwrap_or_default();
        match self.operator.as_str() {
            "In" => labels
                .get(&self.key)
                .is_some_and(|value| values.contains(value)),
            "NotIn" => labels
                .get(&self.key)
                .is_none_or(|value| !values.contains(value)),
            "Exists" => labels.contains_key(&self.key),
            "DoesNotExist" => !labels.contains_key(&self.key),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
