// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the corezone controller
//!
//! The local tests drive the public API end to end (watch events -> dispatcher ->
//! `ZoneHandler` -> filesystem) with reflector stores fed by hand, so they need no
//! cluster. The cluster test is ignored by default.
//!
//! Run the cluster test with: cargo test --test reconcile_integration -- --ignored

use corezone::cache::{ObjectCache, ReflectorCache, SyncFlag};
use corezone::context::Context;
use corezone::controller::Controller;
use corezone::crd::{Record, Zone, ZoneSpec};
use corezone::handler::{Handlers, RecordHandler, ZoneHandler};
use corezone::queue::WorkQueue;
use corezone::resource::ResourceKind;
use corezone::template::ZoneTemplate;
use corezone::watch::{EventTranslator, Watch, WatchEvent};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::runtime::reflector::{self, store::Writer};
use kube::runtime::watcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

// ============================================================================
// Helper Functions
// ============================================================================

const TEMPLATE: &str = "$ORIGIN {{this}}.\n@ IN SOA ns1.{{this}}. admin.{{this}}. 1 7200 3600 1209600 3600\n";

fn zone(name: &str, zone_name: &str, created_second: u32) -> Zone {
    let created: Time = serde_json::from_value(serde_json::json!(format!(
        "2024-01-01T00:00:{created_second:02}Z"
    )))
    .unwrap();
    Zone {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            creation_timestamp: Some(created),
            ..Default::default()
        },
        spec: ZoneSpec {
            zone_name: zone_name.to_string(),
        },
    }
}

/// A running dispatcher whose zone cache is fed by hand.
struct LocalController {
    writer: Writer<Zone>,
    translator: EventTranslator<Zone>,
    events: mpsc::Sender<WatchEvent>,
    stop: watch::Sender<bool>,
    task: JoinHandle<anyhow::Result<()>>,
    zone_dir: PathBuf,
}

impl LocalController {
    async fn start(zone_dir: &Path) -> Self {
        let (zone_store, writer) = reflector::store::<Zone>();
        let (record_store, _record_writer) = reflector::store::<Record>();
        let zones_synced = SyncFlag::new();
        let records_synced = SyncFlag::new();
        zones_synced.mark_synced();
        records_synced.mark_synced();

        let handlers = Handlers::new(
            Arc::new(ZoneHandler::new(
                zone_dir,
                ZoneTemplate::new(TEMPLATE).unwrap(),
            )),
            Arc::new(RecordHandler::new(zone_dir)),
        );
        handlers.init().await.unwrap();

        let ctx = Context::new(
            Arc::new(ReflectorCache::new(
                ResourceKind::Zone,
                zone_store,
                zones_synced,
            )),
            Arc::new(ReflectorCache::new(
                ResourceKind::Record,
                record_store,
                records_synced,
            )),
            WorkQueue::new(),
            handlers,
        );

        let (events, events_rx) = mpsc::channel(16);
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(Controller::new(ctx).run(events_rx, stop_rx));

        Self {
            writer,
            translator: EventTranslator::new(),
            events,
            stop,
            task,
            zone_dir: zone_dir.to_path_buf(),
        }
    }

    /// Apply a watcher event to the store, then forward what it translates to.
    async fn push(&mut self, event: watcher::Event<Zone>) {
        self.writer.apply_watcher_event(&event);
        for out in self.translator.translate(&event) {
            self.events.send(out).await.unwrap();
        }
    }

    async fn stop(self) {
        self.stop.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("controller should stop")
            .expect("controller task should not panic");
        assert!(result.is_ok());
    }

    fn zone_file(&self, namespace: &str, name: &str) -> PathBuf {
        self.zone_dir.join(format!("{namespace}_{name}.zone"))
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition should become true");
}

fn zone_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".zone"))
        .collect();
    names.sort();
    names
}

// ============================================================================
// Local Tests
// ============================================================================

#[tokio::test]
async fn test_zone_lifecycle_materializes_and_removes_file() {
    let dir = TempDir::new().unwrap();
    let mut controller = LocalController::start(dir.path()).await;
    let path = controller.zone_file("default", "example");

    controller
        .push(watcher::Event::Apply(zone("example", "example.com", 1)))
        .await;
    wait_until(|| path.exists()).await;
    let first = std::fs::read(&path).unwrap();
    let expected = ZoneTemplate::new(TEMPLATE)
        .unwrap()
        .render("example.com")
        .unwrap();
    assert_eq!(first, expected.as_bytes());

    controller
        .push(watcher::Event::Delete(zone("example", "example.com", 1)))
        .await;
    wait_until(|| !path.exists()).await;

    controller
        .push(watcher::Event::Apply(zone("example", "example.com", 1)))
        .await;
    wait_until(|| path.exists()).await;
    assert_eq!(std::fs::read(&path).unwrap(), first);

    controller.stop().await;
}

#[tokio::test]
async fn test_conflicting_zones_materialize_only_the_oldest() {
    let dir = TempDir::new().unwrap();
    let mut controller = LocalController::start(dir.path()).await;

    controller
        .push(watcher::Event::Apply(zone("a", "x.com", 1)))
        .await;
    controller
        .push(watcher::Event::Apply(zone("b", "x.com", 2)))
        .await;
    let a_file = controller.zone_file("default", "a");
    wait_until(|| a_file.exists()).await;

    // Give the dispatcher time to process b as well
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(zone_files(dir.path()), vec!["default_a.zone".to_string()]);

    controller.stop().await;
}

#[tokio::test]
async fn test_older_zone_claiming_a_name_replaces_newer_file() {
    let dir = TempDir::new().unwrap();
    let mut controller = LocalController::start(dir.path()).await;
    let a_file = controller.zone_file("default", "a");
    let b_file = controller.zone_file("default", "b");

    controller
        .push(watcher::Event::Apply(zone("b", "x.com", 2)))
        .await;
    controller
        .push(watcher::Event::Apply(zone("a", "y.com", 1)))
        .await;
    wait_until(|| a_file.exists() && b_file.exists()).await;

    controller
        .push(watcher::Event::Apply(zone("a", "x.com", 1)))
        .await;
    wait_until(|| !b_file.exists()).await;
    assert_eq!(zone_files(dir.path()), vec!["default_a.zone".to_string()]);

    controller.stop().await;
}

#[tokio::test]
async fn test_deleting_oldest_zone_hands_name_to_next() {
    let dir = TempDir::new().unwrap();
    let mut controller = LocalController::start(dir.path()).await;

    controller
        .push(watcher::Event::Apply(zone("a", "x.com", 1)))
        .await;
    controller
        .push(watcher::Event::Apply(zone("b", "x.com", 2)))
        .await;
    let a_file = controller.zone_file("default", "a");
    let b_file = controller.zone_file("default", "b");
    wait_until(|| a_file.exists()).await;

    controller
        .push(watcher::Event::Delete(zone("a", "x.com", 1)))
        .await;
    wait_until(|| !a_file.exists() && b_file.exists()).await;

    controller.stop().await;
}

#[tokio::test]
async fn test_relist_removes_zone_missing_from_listing() {
    let dir = TempDir::new().unwrap();
    let mut controller = LocalController::start(dir.path()).await;

    controller
        .push(watcher::Event::Apply(zone("gone", "gone.com", 1)))
        .await;
    let path = controller.zone_file("default", "gone");
    wait_until(|| path.exists()).await;

    controller.push(watcher::Event::Init).await;
    controller.push(watcher::Event::InitDone).await;
    wait_until(|| !path.exists()).await;

    controller.stop().await;
}

// ============================================================================
// Cluster Tests
// ============================================================================

/// Test helper to check if running in a Kubernetes cluster
async fn get_kube_client_or_skip() -> Option<kube::Client> {
    match kube::Client::try_default().await {
        Ok(client) => {
            println!("✓ Successfully connected to Kubernetes cluster");
            Some(client)
        }
        Err(e) => {
            eprintln!("⊘ Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Requires the corezone CRDs to be installed (`cargo run --bin crdgen` then
/// `kubectl apply -f deploy/crds/`).
#[tokio::test]
#[ignore = "requires a Kubernetes cluster with the corezone CRDs installed"]
async fn test_watch_syncs_zone_cache_from_cluster() {
    let Some(client) = get_kube_client_or_skip().await else {
        return;
    };

    let api: kube::Api<Zone> = kube::Api::all(client);
    let (zone_watch, cache) = Watch::new(api);
    let (events_tx, mut events_rx) = mpsc::channel(1024);
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(zone_watch.run(events_tx, stop_rx));

    wait_until(|| cache.has_synced()).await;
    let mut applied = 0;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(1), events_rx.recv()).await
    {
        if matches!(event, WatchEvent::Applied(_)) {
            applied += 1;
        }
    }
    assert_eq!(applied, cache.len(), "every listed zone is announced once");

    stop_tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
