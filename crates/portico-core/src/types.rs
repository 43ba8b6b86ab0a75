// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin data model shared by the loader, the scheduler, and the typed registries.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Priority assigned to manifests that do not declare one.
pub const DEFAULT_PRIORITY: i32 = 1000;

/// Dependency id that matches every plugin of the edge's type.
pub const WILDCARD_ID: &str = "*";

/// Uniqueness key of a plugin across the whole inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginKey {
    pub id: String,
    pub plugin_type: String,
}

impl PluginKey {
    pub fn new(id: impl Into<String>, plugin_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            plugin_type: plugin_type.into(),
        }
    }
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin_type, self.id)
    }
}

/// Plugin categories the runtime knows by name.
///
/// Manifests carry free-form type strings; these variants only name the types
/// that have special meaning (ordering table, repository binding, datasources).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum KnownPluginType {
    SecretProvider,
    Cluster,
    Cache,
    Repository,
    DataPlane,
    Alert,
    Cockpit,
    Policy,
    Connector,
    Resource,
    Fetcher,
    Notifier,
    IdentityProvider,
    Datasource,
    CloudServiceProvider,
    ServiceDiscovery,
    IntegrationProvider,
}

/// A declared "deploy before me" edge in a manifest.
///
/// Written as `type:id` in the manifest, or bare `type` for every plugin of that type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub plugin_type: String,
    pub id: String,
}

impl DependencyEdge {
    pub fn new(plugin_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            plugin_type: plugin_type.into(),
            id: id.into(),
        }
    }

    /// True when `plugin` satisfies this edge.
    pub fn matches(&self, plugin: &Plugin) -> bool {
        plugin.plugin_type == self.plugin_type && (self.id == WILDCARD_ID || self.id == plugin.id)
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin_type, self.id)
    }
}

/// Validated plugin manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    /// Fully qualified name of the plugin's entry symbol.
    pub class_name: String,
    pub plugin_type: String,
    pub category: Option<String>,
    pub feature: Option<String>,
    /// Lower values deploy earlier.
    pub priority: i32,
    pub dependencies: Vec<DependencyEdge>,
    /// Every manifest key outside the reserved set.
    pub properties: BTreeMap<String, String>,
}

/// A discovered plugin: manifest plus the runtime facts gathered at extraction.
///
/// Equality and hashing go through [`PluginKey`].
#[derive(Debug, Clone, Serialize)]
pub struct Plugin {
    pub id: String,
    pub plugin_type: String,
    pub class_name: String,
    pub manifest: PluginManifest,
    /// Working directory the archive was extracted into.
    pub path: PathBuf,
    /// Module jar, then `lib/` jars, then `ext/<id>/` jars.
    pub classpath: Vec<PathBuf>,
    /// Configuration-gated visibility. `false` plugins stay in the inventory.
    pub deployed: bool,
    pub archive_timestamp: DateTime<Utc>,
}

impl Plugin {
    pub fn new(
        manifest: PluginManifest,
        path: PathBuf,
        classpath: Vec<PathBuf>,
        archive_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: manifest.id.clone(),
            plugin_type: manifest.plugin_type.clone(),
            class_name: manifest.class_name.clone(),
            manifest,
            path,
            classpath,
            deployed: true,
            archive_timestamp,
        }
    }

    pub fn key(&self) -> PluginKey {
        PluginKey::new(&self.id, &self.plugin_type)
    }

    pub fn priority(&self) -> i32 {
        self.manifest.priority
    }
}

impl PartialEq for Plugin {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.plugin_type == other.plugin_type
    }
}

impl Eq for Plugin {}

impl std::hash::Hash for Plugin {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.plugin_type.hash(state);
    }
}
