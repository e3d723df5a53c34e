// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `cache.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{Zone, ZoneSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::runtime::reflector::{self, store::Writer};
    use kube::runtime::watcher;
    use std::collections::BTreeMap;

    fn create_zone(namespace: &str, name: &str, labels: &[(&str, &str)]) -> Zone {
        Zone {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            spec: ZoneSpec {
                zone_name: format!("{name}.example"),
            },
        }
    }

    fn populated_cache() -> (ReflectorCache<Zone>, Writer<Zone>, SyncFlag) {
        let (store, mut writer) = reflector::store::<Zone>();
        for zone in [
            create_zone("default", "a", &[("tier", "edge")]),
            create_zone("default", "b", &[]),
            create_zone("other", "c", &[("tier", "edge")]),
        ] {
            writer.apply_watcher_event(&watcher::Event::Apply(zone));
        }
        let synced = SyncFlag::new();
        let cache = ReflectorCache::new(ResourceKind::Zone, store, synced.clone());
        (cache, writer, synced)
    }

    #[test]
    fn test_get_by_key_found_and_missing() {
        let (cache, _writer, _synced) = populated_cache();

        let found = cache.get_by_key("default/a").unwrap();
        assert_eq!(found.unwrap().spec.zone_name, "a.example");

        assert!(cache.get_by_key("default/missing").unwrap().is_none());
        assert!(cache.get_by_key("other/a").unwrap().is_none());
    }

    #[test]
    fn test_get_by_malformed_key_is_a_lookup_error() {
        let (cache, _writer, _synced) = populated_cache();
        let err = cache.get_by_key("no-namespace-name").unwrap_err();
        assert!(matches!(err, CacheError::Lookup { kind: ResourceKind::Zone, .. }));
    }

    #[test]
    fn test_list_is_namespace_scoped() {
        let (cache, _writer, _synced) = populated_cache();

        let mut names: Vec<_> = cache
            .list("default", &LabelSelector::default())
            .unwrap()
            .iter()
            .map(|z| z.name_any())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_list_applies_selector() {
        let (cache, _writer, _synced) = populated_cache();
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([("tier".to_string(), "edge".to_string())])),
            match_expressions: None,
        };

        let zones = cache.list("default", &selector).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name_any(), "a");
    }

    #[test]
    fn test_deleted_object_disappears() {
        let (cache, mut writer, _synced) = populated_cache();
        writer.apply_watcher_event(&watcher::Event::Delete(create_zone("default", "a", &[])));
        assert!(cache.get_by_key("default/a").unwrap().is_none());
    }

    #[test]
    fn test_has_synced_follows_flag() {
        let (cache, _writer, synced) = populated_cache();
        assert!(!cache.has_synced());
        synced.mark_synced();
        assert!(cache.has_synced());
    }
}
