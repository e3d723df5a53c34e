// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `selector.rs`

use crate::crd::{LabelSelector, LabelSelectorRequirement};
use std::collections::BTreeMap;

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn requirement(key: &str, operator: &str, values: Option<&[&str]>) -> LabelSelectorRequirement {
    LabelSelectorRequirement {
        key: key.to_string(),
        operator: operator.to_string(),
        values: values.map(|v| v.iter().map(|s| (*s).to_string()).collect()),
    }
}

#[test]
fn test_empty_selector_matches_everything() {
    let selector = LabelSelector::default();
    assert!(selector.is_empty());
    assert!(selector.matches(&BTreeMap::new()));
    assert!(selector.matches(&labels(&[("app", "dns")])));
}

#[test]
fn test_match_labels() {
    let selector = LabelSelector {
        match_labels: Some(labels(&[("app", "dns"), ("tier", "edge")])),
        match_expressions: None,
    };
    assert!(!selector.is_empty());
    assert!(selector.matches(&labels(&[("app", "dns"), ("tier", "edge"), ("x", "y")])));
    assert!(!selector.matches(&labels(&[("app", "dns")])));
    assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "edge")])));
}

#[test]
fn test_in_and_not_in() {
    let in_selector = LabelSelector {
        match_labels: None,
        match_expressions: Some(vec![requirement("env", "In", Some(&["prod", "staging"]))]),
    };
    assert!(in_selector.matches(&labels(&[("env", "prod")])));
    assert!(!in_selector.matches(&labels(&[("env", "dev")])));
    assert!(!in_selector.matches(&BTreeMap::new()));

    let not_in = LabelSelector {
        match_labels: None,
        match_expressions: Some(vec![requirement("env", "NotIn", Some(&["prod"]))]),
    };
    assert!(not_in.matches(&labels(&[("env", "dev")])));
    assert!(not_in.matches(&BTreeMap::new()));
    assert!(!not_in.matches(&labels(&[("env", "prod")])));
}

#[test]
fn test_exists_and_does_not_exist() {
    let exists = LabelSelector {
        match_labels: None,
        match_expressions: Some(vec![requirement("managed", "Exists", None)]),
    };
    assert!(exists.matches(&labels(&[("managed", "")])));
    assert!(!exists.matches(&BTreeMap::new()));

    let absent = LabelSelector {
        match_labels: None,
        match_expressions: Some(vec![requirement("managed", "DoesNotExist", None)]),
    };
    assert!(absent.matches(&BTreeMap::new()));
    assert!(!absent.matches(&labels(&[("managed", "true")])));
}

#[test]
fn test_unknown_operator_never_matches() {
    let selector = LabelSelector {
        match_labels: None,
        match_expressions: Some(vec![requirement("env", "Like", Some(&["prod"]))]),
    };
    assert!(!selector.matches(&labels(&[("env", "prod")])));
}

#[test]
fn test_labels_and_expressions_are_anded() {
    let selector = LabelSelector {
        match_labels: Some(labels(&[("app", "dns")])),
        match_expressions: Some(vec![requirement("env", "In", Some(&["prod"]))]),
    };
    assert!(selector.matches(&labels(&[("app", "dns"), ("env", "prod")])));
    assert!(!selector.matches(&labels(&[("app", "dns"), ("env", "dev")])));
    assert!(!selector.matches(&labels(&[("env", "prod")])));
}
