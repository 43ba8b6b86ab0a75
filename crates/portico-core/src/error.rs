// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Portico plugin runtime.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::PluginKey;

/// The primary error type used across plugin discovery, ordering, and deployment.
#[derive(Debug, Error)]
pub enum PorticoError {
    /// Configuration errors (no plugin root, missing scope type, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors tied to a concrete path.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A plugin archive or module could not be read or extracted.
    #[error("archive error: {message}")]
    Archive {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A plugin manifest is absent or fails validation.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Two discovered plugins share the same `(id, type)` key.
    #[error("duplicate plugin {key}")]
    DuplicatePlugin { key: PluginKey },

    /// A symbol could not be resolved through an isolation boundary.
    #[error("symbol not found: {name}")]
    SymbolNotFound { name: String },

    /// The isolation boundary was used after `release()`.
    #[error("isolation boundary for {plugin} has been released")]
    BoundaryReleased { plugin: String },

    /// Building a plugin instance from a resolved symbol failed.
    #[error("failed to instantiate {symbol}: {message}")]
    Instantiation { symbol: String, message: String },

    /// The "requires" relation between plugins contains a cycle.
    #[error("dependency cycle detected: {}", format_cycle(path))]
    DependencyCycle { path: Vec<PluginKey> },

    /// A deployment handler failed while processing a plugin.
    #[error("handler {handler} failed for {plugin}: {message}")]
    Handler {
        handler: String,
        plugin: PluginKey,
        message: String,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PorticoError {
    /// Wraps an `std::io::Error` with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PorticoError::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_cycle(path: &[PluginKey]) -> String {
    path.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
