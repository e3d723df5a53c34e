// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Side-effect handlers.
//!
//! A [`Handler`] applies the desired state of one resource kind to the outside world.
//! Handlers are idempotent: calling `object_created` twice for the same object leaves the
//! same state as calling it once.
//!
//! The dispatcher never sees an individual handler. It goes through the [`Handlers`]
//! table, which matches on the [`DnsObject`] variant and forwards the typed payload to
//! the handler registered for that kind.
//!
//! # Handlers
//!
//! - [`ZoneHandler`] - renders the zone template into `<zone_dir>/<namespace>_<name>.zone`
//! - [`RecordHandler`] - logs only; record materialization does not exist yet

use crate::constants::{ZONE_FILE_EXTENSION, ZONE_FILE_SEPARATOR};
use crate::crd::{Record, Zone};
use crate::errors::{HandlerError, KeyError};
use crate::resource::{object_key, split_key, DnsObject};
use crate::template::ZoneTemplate;
use async_trait::async_trait;
use kube::ResourceExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Applies the desired state of objects of type `K`.
#[async_trait]
pub trait Handler<K>: Send + Sync
where
    K: Send + Sync + 'static,
{
    /// Prepare the handler before the first object is dispatched.
    async fn init(&self) -> Result<(), HandlerError>;

    /// Materialize `obj`.
    async fn object_created(&self, obj: &K) -> Result<(), HandlerError>;

    /// Remove whatever was materialized for `obj`.
    async fn object_deleted(&self, obj: &K) -> Result<(), HandlerError>;

    /// Replace the state of `old` with that of `new`.
    ///
    /// Delete-then-recreate, not an in-place patch.
    async fn object_updated(&self, old: &K, new: &K) -> Result<(), HandlerError> {
        self.object_deleted(old).await?;
        self.object_created(new).await
    }
}

/// Handler table keyed by resource kind.
#[derive(Clone)]
pub struct Handlers {
    zone: Arc<dyn Handler<Zone>>,
    record: Arc<dyn Handler<Record>>,
}

impl Handlers {
    /// Register one handler per kind.
    pub fn new(zone: Arc<dyn Handler<Zone>>, record: Arc<dyn Handler<Record>>) -> Self {
        Self { zone, record }
    }

    /// Initialize every handler.
    ///
    /// # Errors
    ///
    /// Returns the first handler initialization failure.
    pub async fn init(&self) -> Result<(), HandlerError> {
        self.zone.init().await?;
        self.record.init().await
    }

    /// Forward a create to the handler for the object's kind.
    ///
    /// # Errors
    ///
    /// Returns the handler's error.
    pub async fn object_created(&self, obj: &DnsObject) -> Result<(), HandlerError> {
        match obj {
            DnsObject::Zone(zone) => self.zone.object_created(zone).await,
            DnsObject::Record(record) => self.record.object_created(record).await,
        }
    }

    /// Forward a delete to the handler for the object's kind.
    ///
    /// # Errors
    ///
    /// Returns the handler's error.
    pub async fn object_deleted(&self, obj: &DnsObject) -> Result<(), HandlerError> {
        match obj {
            DnsObject::Zone(zone) => self.zone.object_deleted(zone).await,
            DnsObject::Record(record) => self.record.object_deleted(record).await,
        }
    }

    /// Forward an update to the handler for the objects' kind.
    ///
    /// Objects of different kinds are handled as a delete of `old` followed by a create
    /// of `new`, each by its own handler.
    ///
    /// # Errors
    ///
    /// Returns the handler's error.
    pub async fn object_updated(
        &self,
        old: &DnsObject,
        new: &DnsObject,
    ) -> Result<(), HandlerError> {
        match (old, new) {
            (DnsObject::Zone(old), DnsObject::Zone(new)) => {
                self.zone.object_updated(old, new).await
            }
            (DnsObject::Record(old), DnsObject::Record(new)) => {
                self.record.object_updated(old, new).await
            }
            _ => {
                self.object_deleted(old).await?;
                self.object_created(new).await
            }
        }
    }
}

/// Materializes zones as files in a directory watched by CoreDNS.
///
/// Existing files are atomically replaced: the rendered content is written to a
/// temporary file next to the target and renamed over it. A file that already holds the
/// rendered bytes is left untouched.
#[derive(Clone, Debug)]
pub struct ZoneHandler {
    zone_dir: PathBuf,
    template: ZoneTemplate,
}

impl ZoneHandler {
    /// Create a handler writing into `zone_dir` with `template`.
    pub fn new(zone_dir: impl Into<PathBuf>, template: ZoneTemplate) -> Self {
        Self {
            zone_dir: zone_dir.into(),
            template,
        }
    }

    /// Directory holding the zone files.
    #[must_use]
    pub fn zone_dir(&self) -> &Path {
        &self.zone_dir
    }

    /// File name of the zone, `<namespace>_<name>.zone`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the zone has no name or no namespace.
    pub fn file_name(zone: &Zone) -> Result<String, KeyError> {
        let key = object_key(zone)?;
        let (namespace, name) = split_key(&key)?;
        Ok(format!(
            "{namespace}{ZONE_FILE_SEPARATOR}{name}.{ZONE_FILE_EXTENSION}"
        ))
    }

    /// Full path of the zone file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the zone has no name or no namespace.
    pub fn path_for(&self, zone: &Zone) -> Result<PathBuf, KeyError> {
        Ok(self.zone_dir.join(Self::file_name(zone)?))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> HandlerError + '_ {
    move |source| HandlerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl Handler<Zone> for ZoneHandler {
    async fn init(&self) -> Result<(), HandlerError> {
        tokio::fs::create_dir_all(&self.zone_dir)
            .await
            .map_err(io_error(&self.zone_dir))?;
        info!(zone_dir = %self.zone_dir.display(), "ZoneHandler initialized");
        Ok(())
    }

    async fn object_created(&self, zone: &Zone) -> Result<(), HandlerError> {
        let path = self.path_for(zone)?;
        let content = self.template.render(&zone.spec.zone_name)?;

        match tokio::fs::read(&path).await {
            Ok(existing) if existing == content.as_bytes() => {
                debug!(
                    zone = %zone.name_any(),
                    path = %path.display(),
                    "Zone file already up to date"
                );
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&path)(e)),
        }

        let file_name = Self::file_name(zone)?;
        let tmp_path = self.zone_dir.join(format!("{file_name}.tmp"));
        tokio::fs::write(&tmp_path, content.as_bytes())
            .await
            .map_err(io_error(&tmp_path))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_error(&path)(e));
        }

        info!(
            zone = %zone.name_any(),
            zone_name = %zone.spec.zone_name,
            path = %path.display(),
            "Zone file written"
        );
        Ok(())
    }

    async fn object_deleted(&self, zone: &Zone) -> Result<(), HandlerError> {
        let path = self.path_for(zone)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(zone = %zone.name_any(), path = %path.display(), "Zone file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Zone file already absent");
                Ok(())
            }
            Err(e) => Err(io_error(&path)(e)),
        }
    }
}

/// Record handler.
///
/// Records are tracked by the controller but not materialized: every callback only logs.
#[derive(Clone, Debug)]
pub struct RecordHandler {
    zone_dir: PathBuf,
}

impl RecordHandler {
    /// Create a record handler for `zone_dir`.
    pub fn new(zone_dir: impl Into<PathBuf>) -> Self {
        Self {
            zone_dir: zone_dir.into(),
        }
    }
}

#[async_trait]
impl Handler<Record> for RecordHandler {
    async fn init(&self) -> Result<(), HandlerError> {
        info!(zone_dir = %self.zone_dir.display(), "RecordHandler initialized");
        Ok(())
    }

    async fn object_created(&self, record: &Record) -> Result<(), HandlerError> {
        info!(
            record = %record.name_any(),
            zone_name = %record.spec.zone_name,
            "RecordHandler.object_created"
        );
        Ok(())
    }

    async fn object_deleted(&self, record: &Record) -> Result<(), HandlerError> {
        info!(
            record = %record.name_any(),
            zone_name = %record.spec.zone_name,
            "RecordHandler.object_deleted"
        );
        Ok(())
    }

    async fn object_updated(&self, old: &Record, new: &Record) -> Result<(), HandlerError> {
        info!(
            record = %new.name_any(),
            old_zone_name = %old.spec.zone_name,
            zone_name = %new.spec.zone_name,
            "RecordHandler.object_updated"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod handler_tests;
