// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `context.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::cache::{ReflectorCache, SyncFlag};
    use crate::handler::{RecordHandler, ZoneHandler};
    use crate::resource::ResourceKind;
    use crate::template::ZoneTemplate;
    use kube::runtime::reflector;

    fn context(zones_synced: &SyncFlag, records_synced: &SyncFlag) -> Context {
        let (zone_store, _zone_writer) = reflector::store::<Zone>();
        let (record_store, _record_writer) = reflector::store::<Record>();
        Context::new(
            Arc::new(ReflectorCache::new(
                ResourceKind::Zone,
                zone_store,
                zones_synced.clone(),
            )),
            Arc::new(ReflectorCache::new(
                ResourceKind::Record,
                record_store,
                records_synced.clone(),
            )),
            WorkQueue::new(),
            Handlers::new(
                Arc::new(ZoneHandler::new(
                    "/tmp/zones",
                    ZoneTemplate::embedded().unwrap(),
                )),
                Arc::new(RecordHandler::new("/tmp/zones")),
            ),
        )
    }

    #[test]
    fn test_caches_synced_requires_every_kind() {
        let zones = SyncFlag::new();
        let records = SyncFlag::new();
        let ctx = context(&zones, &records);

        assert!(!ctx.caches_synced());
        zones.mark_synced();
        assert!(!ctx.caches_synced());
        records.mark_synced();
        assert!(ctx.caches_synced());
    }

    #[test]
    fn test_clones_share_the_queue() {
        let ctx = context(&SyncFlag::new(), &SyncFlag::new());
        let clone = ctx.clone();

        ctx.queue
            .add(ResourceKey::new("default/example", ResourceKind::Zone));
        assert_eq!(clone.queue.len(), 1);
    }
}
