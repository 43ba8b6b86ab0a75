// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code-loading boundary between a plugin and the host.
//!
//! A boundary resolves symbols from its own classpath first and then from its
//! parent. It is a symbol namespace, not an OS sandbox.

use std::path::PathBuf;

use crate::error::PorticoError;

/// Where a resolved symbol was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOrigin {
    /// Exported by the host process.
    Host,
    /// Found in a classpath archive.
    Archive(PathBuf),
}

/// A resolved symbol. Builders are looked up by `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolHandle {
    pub name: String,
    pub origin: SymbolOrigin,
}

/// A symbol namespace scoped to one plugin's classpath.
pub trait IsolationBoundary: Send + Sync {
    /// Resolves `name`, child-first, falling back to the parent boundary.
    fn load_symbol(&self, name: &str) -> Result<SymbolHandle, PorticoError>;

    /// Frees held file handles. Later lookups fail with `BoundaryReleased`.
    fn release(&self);

    /// Entries this boundary resolves from, in lookup order.
    fn classpath(&self) -> &[PathBuf];
}
