// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller configuration.
//!
//! Every setting is a command-line flag with an environment override:
//!
//! | Flag | Environment | Default |
//! |---|---|---|
//! | `--zone-dir` (also `--zone_dir`) | `COREDNS_ZONE_DIR` | `/tmp/zones/` |
//! | `--template` | `COREDNS_TEMPLATE` | embedded `coredns.tmpl` |
//! | `--namespace` | `COREDNS_NAMESPACE` | all namespaces |
//! | `--metrics-addr` | `COREDNS_METRICS_ADDR` | `0.0.0.0:8080` |
//! | `--event-buffer` | `COREDNS_EVENT_BUFFER` | `1024` |

use crate::constants::{DEFAULT_EVENT_BUFFER, DEFAULT_METRICS_ADDR, DEFAULT_ZONE_DIR};
use crate::errors::HandlerError;
use crate::handler::{RecordHandler, ZoneHandler};
use crate::template::ZoneTemplate;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Kubernetes controller that materializes Zone resources as CoreDNS zone files.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "corezone")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Directory the zone files are written to.
    #[arg(
        long = "zone-dir",
        alias = "zone_dir",
        env = "COREDNS_ZONE_DIR",
        default_value = DEFAULT_ZONE_DIR
    )]
    pub zone_dir: PathBuf,

    /// Zone template file. The built-in template is used when unset.
    #[arg(long, env = "COREDNS_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Only watch this namespace.
    #[arg(long, env = "COREDNS_NAMESPACE")]
    pub namespace: Option<String>,

    /// Bind address of the Prometheus endpoint.
    #[arg(long, env = "COREDNS_METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    /// Capacity of the channel between the watchers and the dispatcher.
    #[arg(
        long,
        env = "COREDNS_EVENT_BUFFER",
        default_value_t = DEFAULT_EVENT_BUFFER,
        value_parser = parse_event_buffer
    )]
    pub event_buffer: usize,
}

fn parse_event_buffer(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("event buffer must hold at least one event".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Config {
    /// Compile the configured zone template.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] if the template file cannot be read or does not parse.
    pub fn zone_template(&self) -> Result<ZoneTemplate, HandlerError> {
        match &self.template {
            Some(path) => ZoneTemplate::from_file(path),
            None => ZoneTemplate::embedded(),
        }
    }

    /// Build the zone handler for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] if the zone template is unusable.
    pub fn zone_handler(&self) -> Result<ZoneHandler, HandlerError> {
        Ok(ZoneHandler::new(&self.zone_dir, self.zone_template()?))
    }

    /// Build the record handler for this configuration.
    #[must_use]
    pub fn record_handler(&self) -> RecordHandler {
        RecordHandler::new(&self.zone_dir)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
