// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `watch.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::ZoneSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn zone(name: &str) -> Zone {
        Zone {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: ZoneSpec {
                zone_name: format!("{name}.com"),
            },
        }
    }

    fn applied(name: &str) -> WatchEvent {
        WatchEvent::Applied(ResourceKey::new(format!("default/{name}"), ResourceKind::Zone))
    }

    fn initial_listing(translator: &mut EventTranslator<Zone>, names: &[&str]) -> Vec<WatchEvent> {
        let mut out = translator.translate(&watcher::Event::Init);
        for name in names {
            out.extend(translator.translate(&watcher::Event::InitApply(zone(name))));
        }
        out.extend(translator.translate(&watcher::Event::InitDone));
        out
    }

    #[test]
    fn test_apply_emits_applied_key() {
        let mut translator = EventTranslator::<Zone>::new();
        let out = translator.translate(&watcher::Event::Apply(zone("a")));
        assert_eq!(out, vec![applied("a")]);
        assert_eq!(translator.known(), 1);
    }

    #[test]
    fn test_delete_emits_snapshot() {
        let mut translator = EventTranslator::<Zone>::new();
        translator.translate(&watcher::Event::Apply(zone("a")));

        let out = translator.translate(&watcher::Event::Delete(zone("a")));
        assert_eq!(out, vec![WatchEvent::Deleted(DnsObject::from(zone("a")))]);
        assert_eq!(translator.known(), 0);
    }

    #[test]
    fn test_initial_listing_is_held_until_init_done() {
        let mut translator = EventTranslator::<Zone>::new();

        assert!(translator.translate(&watcher::Event::Init).is_empty());
        assert!(translator
            .translate(&watcher::Event::InitApply(zone("a")))
            .is_empty());
        let out = translator.translate(&watcher::Event::InitDone);

        assert_eq!(out, vec![applied("a")]);
    }

    #[test]
    fn test_relist_reports_vanished_objects_as_deleted() {
        let mut translator = EventTranslator::<Zone>::new();
        initial_listing(&mut translator, &["a", "b"]);

        let out = initial_listing(&mut translator, &["a"]);

        assert_eq!(
            out,
            vec![WatchEvent::Deleted(DnsObject::from(zone("b"))), applied("a")]
        );
        assert_eq!(translator.known(), 1);
    }

    #[test]
    fn test_unaddressable_object_is_ignored() {
        let mut translator = EventTranslator::<Zone>::new();
        let mut nameless = zone("a");
        nameless.metadata.name = None;

        assert!(translator
            .translate(&watcher::Event::Apply(nameless))
            .is_empty());
        assert_eq!(translator.known(), 0);
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(<Zone as WatchedResource>::KIND, ResourceKind::Zone);
        assert_eq!(<Record as WatchedResource>::KIND, ResourceKind::Record);
    }
}
