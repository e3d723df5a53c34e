// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use clap::Parser;
use corezone::{
    config::Config,
    constants::{METRICS_PATH, TOKIO_WORKER_THREADS},
    context::Context,
    controller::Controller,
    crd::{Record, Zone},
    handler::Handlers,
    metrics,
    queue::WorkQueue,
    watch::{Watch, WatchedResource},
};
use kube::{Api, Client};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let config = Config::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("corezone-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_logging() {
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Respects RUST_LOG_FORMAT environment variable for output format (json or text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: Config) -> Result<()> {
    init_logging();

    info!(
        zone_dir = %config.zone_dir.display(),
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        "Starting corezone controller"
    );

    let zone_handler = config
        .zone_handler()
        .context("failed to load zone template")?;
    let handlers = Handlers::new(Arc::new(zone_handler), Arc::new(config.record_handler()));
    handlers
        .init()
        .await
        .context("failed to initialize handlers")?;

    // Initialize Kubernetes client
    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let (zone_watch, zone_cache) = Watch::new(scoped_api::<Zone>(&client, &config));
    let (record_watch, record_cache) = Watch::new(scoped_api::<Record>(&client, &config));

    let (events_tx, events_rx) = mpsc::channel(config.event_buffer);
    let (stop_tx, stop_rx) = watch::channel(false);

    let ctx = Context::new(
        Arc::new(zone_cache),
        Arc::new(record_cache),
        WorkQueue::new(),
        handlers,
    );
    let controller = Controller::new(ctx);

    let watch_tasks: Vec<(&str, JoinHandle<Result<()>>)> = vec![
        (
            "Zone",
            tokio::spawn(zone_watch.run(events_tx.clone(), stop_rx.clone())),
        ),
        (
            "Record",
            tokio::spawn(record_watch.run(events_tx, stop_rx.clone())),
        ),
    ];

    let listener = TcpListener::bind(config.metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics endpoint on {}", config.metrics_addr))?;
    info!(addr = %config.metrics_addr, path = METRICS_PATH, "Serving metrics");
    let metrics_task = tokio::spawn(serve_metrics(listener, stop_rx.clone()));

    let mut controller_task = tokio::spawn(controller.run(events_rx, stop_rx));

    let result = tokio::select! {
        result = &mut controller_task => {
            error!("Controller exited unexpectedly: {:?}", result);
            result?
        }
        () = shutdown_signal() => {
            info!("Shutdown signal received, stopping controller");
            // Receivers only go away together with their tasks
            let _ = stop_tx.send(true);
            controller_task.await?
        }
    };
    let _ = stop_tx.send(true);

    for (kind, task) in watch_tasks {
        match task.await {
            Ok(Ok(())) => debug!(kind, "Watch task finished"),
            Ok(Err(e)) => error!(kind, error = %e, "Watch task failed"),
            Err(e) => error!(kind, error = %e, "Watch task panicked"),
        }
    }
    match metrics_task.await {
        Ok(Ok(())) => debug!("Metrics server stopped"),
        Ok(Err(e)) => error!(error = %e, "Metrics server failed"),
        Err(e) => error!(error = %e, "Metrics server panicked"),
    }

    match &result {
        Ok(()) => info!("Graceful shutdown completed successfully"),
        Err(e) => error!(error = %e, "Controller stopped with error"),
    }
    result
}

/// Api handle for `K`, restricted to the configured namespace if any.
fn scoped_api<K: WatchedResource>(client: &Client, config: &Config) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
{
    match config.namespace.as_deref() {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM (pod termination).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        () = terminate => info!("Received SIGTERM (pod termination)"),
    }
}

fn metrics_router() -> Router {
    Router::new().route(METRICS_PATH, get(metrics_handler))
}

async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Serve `/metrics` on `listener` until `stop` flips to `true`.
async fn serve_metrics(listener: TcpListener, mut stop: watch::Receiver<bool>) -> Result<()> {
    axum::serve(listener, metrics_router())
        .with_graceful_shutdown(async move {
            let _ = stop.wait_for(|stopped| *stopped).await;
        })
        .await
        .context("metrics server failed")
}
