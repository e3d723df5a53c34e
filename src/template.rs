// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone template rendering.
//!
//! A zone template receives exactly one value, the zone name, available as `{{this}}`.
//! The default template (`templates/coredns.tmpl`) is compiled into the binary; a
//! deployment can point the controller at another file instead.

use crate::constants::ZONE_TEMPLATE_NAME;
use crate::errors::HandlerError;
use handlebars::Handlebars;
use std::path::Path;

/// Zone template shipped with the controller.
pub const DEFAULT_ZONE_TEMPLATE: &str = include_str!("../templates/coredns.tmpl");

/// A compiled zone template.
#[derive(Clone, Debug)]
pub struct ZoneTemplate {
    registry: Handlebars<'static>,
}

impl ZoneTemplate {
    /// Compile a template from source text.
    ///
    /// Output is not HTML-escaped: zone files are plain text.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Template`] if the source does not parse.
    pub fn new(source: &str) -> Result<Self, HandlerError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string(ZONE_TEMPLATE_NAME, source)
            .map_err(|e| HandlerError::Template {
                reason: e.to_string(),
            })?;
        Ok(Self { registry })
    }

    /// Compile the built-in template.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Template`] if the built-in template does not parse.
    pub fn embedded() -> Result<Self, HandlerError> {
        Self::new(DEFAULT_ZONE_TEMPLATE)
    }

    /// Read and compile a template file.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Io`] if the file cannot be read, or
    /// [`HandlerError::Template`] if it does not parse.
    pub fn from_file(path: &Path) -> Result<Self, HandlerError> {
        let source = std::fs::read_to_string(path).map_err(|source| HandlerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(&source)
    }

    /// Render the template for `zone_name`.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Render`] if rendering fails.
    pub fn render(&self, zone_name: &str) -> Result<String, HandlerError> {
        self.registry
            .render(ZONE_TEMPLATE_NAME, &zone_name)
            .map_err(|e| HandlerError::Render {
                zone: zone_name.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod template_tests;
