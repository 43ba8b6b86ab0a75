// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Isolation boundaries and the factories that hand them out.
//!
//! [`HostBoundary`] is the root namespace: symbols compiled into the host.
//! [`ArchiveBoundary`] resolves a dotted symbol `a.b.C` to the entry
//! `a/b/C.class` across its classpath jars, child-first, then asks its parent.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use portico_core::{IsolationBoundary, Plugin, PorticoError, SymbolHandle, SymbolOrigin};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Entry suffix of a symbol inside a classpath jar.
pub const SYMBOL_ENTRY_SUFFIX: &str = ".class";

/// Archive entry name for a dotted symbol name.
pub fn symbol_entry_name(symbol: &str) -> String {
    format!("{}{SYMBOL_ENTRY_SUFFIX}", symbol.replace('.', "/"))
}

/// Symbols exported by the host process.
#[derive(Debug, Default)]
pub struct HostBoundary {
    symbols: HashSet<String>,
}

impl HostBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn export(&mut self, symbol: impl Into<String>) {
        self.symbols.insert(symbol.into());
    }
}

impl IsolationBoundary for HostBoundary {
    fn load_symbol(&self, name: &str) -> Result<SymbolHandle, PorticoError> {
        if self.symbols.contains(name) {
            Ok(SymbolHandle {
                name: name.to_string(),
                origin: SymbolOrigin::Host,
            })
        } else {
            Err(PorticoError::SymbolNotFound {
                name: name.to_string(),
            })
        }
    }

    fn release(&self) {}

    fn classpath(&self) -> &[PathBuf] {
        &[]
    }
}

type OpenJars = Vec<(PathBuf, ZipArchive<File>)>;

/// Boundary over one plugin's classpath jars.
///
/// Holds every jar open until [`release`](IsolationBoundary::release).
pub struct ArchiveBoundary {
    plugin_id: String,
    classpath: Vec<PathBuf>,
    jars: Mutex<Option<OpenJars>>,
    parent: Arc<dyn IsolationBoundary>,
}

impl ArchiveBoundary {
    /// Opens every classpath entry. Fails if any jar cannot be read.
    pub fn open(
        plugin_id: impl Into<String>,
        classpath: &[PathBuf],
        parent: Arc<dyn IsolationBoundary>,
    ) -> Result<Self, PorticoError> {
        let jars = classpath
            .iter()
            .map(|path| open_jar(path).map(|jar| (path.clone(), jar)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            plugin_id: plugin_id.into(),
            classpath: classpath.to_vec(),
            jars: Mutex::new(Some(jars)),
            parent,
        })
    }

    pub fn is_released(&self) -> bool {
        self.jars.lock().is_none()
    }
}

fn open_jar(path: &Path) -> Result<ZipArchive<File>, PorticoError> {
    let file = File::open(path).map_err(|e| PorticoError::io(path, e))?;
    ZipArchive::new(file).map_err(|e| PorticoError::Archive {
        message: format!("cannot open classpath entry {}", path.display()),
        source: Some(Box::new(e)),
    })
}

impl IsolationBoundary for ArchiveBoundary {
    fn load_symbol(&self, name: &str) -> Result<SymbolHandle, PorticoError> {
        let entry = symbol_entry_name(name);
        {
            let guard = self.jars.lock();
            let jars = guard.as_ref().ok_or_else(|| PorticoError::BoundaryReleased {
                plugin: self.plugin_id.clone(),
            })?;
            if let Some((path, _)) = jars.iter().find(|(_, jar)| jar.index_for_name(&entry).is_some())
            {
                return Ok(SymbolHandle {
                    name: name.to_string(),
                    origin: SymbolOrigin::Archive(path.clone()),
                });
            }
        }
        self.parent.load_symbol(name)
    }

    fn release(&self) {
        if self.jars.lock().take().is_some() {
            debug!(plugin = %self.plugin_id, "released isolation boundary");
        }
    }

    fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }
}

/// Hands out boundaries for plugins.
pub trait BoundaryFactory: Send + Sync {
    /// Boundary over `plugin.classpath` parented to `parent`.
    ///
    /// Construction failures are logged and reported as `None`; callers skip the plugin.
    fn get_or_create(
        &self,
        plugin: &Plugin,
        parent: Arc<dyn IsolationBoundary>,
    ) -> Option<Arc<dyn IsolationBoundary>>;

    /// Called once the caller is done loading from `boundary`.
    fn finish(&self, plugin: &Plugin, boundary: &Arc<dyn IsolationBoundary>);
}

fn create_boundary(
    plugin: &Plugin,
    parent: Arc<dyn IsolationBoundary>,
) -> Option<Arc<dyn IsolationBoundary>> {
    match ArchiveBoundary::open(&plugin.id, &plugin.classpath, parent) {
        Ok(boundary) => Some(Arc::new(boundary)),
        Err(e) => {
            warn!(plugin = %plugin.key(), error = %e, "unable to create isolation boundary");
            None
        }
    }
}

/// Fresh boundary per call, released as soon as the caller finishes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBoundaryFactory;

impl BoundaryFactory for DefaultBoundaryFactory {
    fn get_or_create(
        &self,
        plugin: &Plugin,
        parent: Arc<dyn IsolationBoundary>,
    ) -> Option<Arc<dyn IsolationBoundary>> {
        create_boundary(plugin, parent)
    }

    fn finish(&self, _plugin: &Plugin, boundary: &Arc<dyn IsolationBoundary>) {
        boundary.release();
    }
}

/// One boundary per plugin id, kept until explicitly evicted.
#[derive(Default)]
pub struct CachingBoundaryFactory {
    cache: DashMap<String, Arc<dyn IsolationBoundary>>,
}

impl CachingBoundaryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, plugin_id: &str) -> Option<Arc<dyn IsolationBoundary>> {
        self.cache.get(plugin_id).map(|b| Arc::clone(b.value()))
    }

    /// Drops and releases the cached boundary of `plugin_id`.
    pub fn evict(&self, plugin_id: &str) {
        if let Some((_, boundary)) = self.cache.remove(plugin_id) {
            boundary.release();
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl BoundaryFactory for CachingBoundaryFactory {
    fn get_or_create(
        &self,
        plugin: &Plugin,
        parent: Arc<dyn IsolationBoundary>,
    ) -> Option<Arc<dyn IsolationBoundary>> {
        if let Some(boundary) = self.cached(&plugin.id) {
            return Some(boundary);
        }
        let boundary = create_boundary(plugin, parent)?;
        Some(Arc::clone(
            self.cache
                .entry(plugin.id.clone())
                .or_insert(boundary)
                .value(),
        ))
    }

    fn finish(&self, _plugin: &Plugin, _boundary: &Arc<dyn IsolationBoundary>) {}
}
