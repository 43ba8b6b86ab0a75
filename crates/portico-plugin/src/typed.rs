// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-category plugin store with deployed/undeployed visibility.
//!
//! Workspace resources are read from the plugin's extraction directory:
//! `schemas/[<sub>/]`, `docs/`, `category/` and `more-information/` each
//! must hold exactly one file for the accessor to return anything.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use parking_lot::RwLock;
use portico_core::Plugin;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const SCHEMAS_DIR: &str = "schemas";
pub const DOCUMENTATION_DIR: &str = "docs";
pub const CATEGORY_DIR: &str = "category";
pub const MORE_INFORMATION_DIR: &str = "more-information";

/// Anything a typed registry can store: it must expose its [`Plugin`].
pub trait TypedPlugin: Clone + Send + Sync {
    fn plugin(&self) -> &Plugin;
}

impl TypedPlugin for Plugin {
    fn plugin(&self) -> &Plugin {
        self
    }
}

/// A plugin plus the symbols its category handler discovered for it.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    pub plugin: Plugin,
    /// Resolved configuration type, when the plugin declares one.
    pub configuration_type: Option<String>,
    /// Resolved configuration mapper type, when the plugin declares one.
    pub mapper_type: Option<String>,
}

impl TypedPlugin for PluginRecord {
    fn plugin(&self) -> &Plugin {
        &self.plugin
    }
}

/// Structured "more information" resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoreInformation {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub documentation_url: Option<String>,
    /// Relative in the file; resolved against the plugin workspace on read.
    #[serde(default)]
    pub schema_img: Option<PathBuf>,
}

/// Store of one plugin category, keyed by plugin id.
pub struct TypedPluginRegistry<T: TypedPlugin> {
    entries: RwLock<BTreeMap<String, T>>,
}

impl<T: TypedPlugin> Default for TypedPluginRegistry<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: TypedPlugin> TypedPluginRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts by id. Returns `false` and keeps the existing entry on a duplicate id.
    pub fn register(&self, entry: T) -> bool {
        let id = entry.plugin().id.clone();
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            debug!(id = %id, "plugin already registered in typed registry");
            return false;
        }
        entries.insert(id, entry);
        true
    }

    /// Deployed entries, sorted by id.
    pub fn find_all(&self) -> Vec<T> {
        self.find_all_including(false)
    }

    pub fn find_all_including(&self, include_undeployed: bool) -> Vec<T> {
        self.entries
            .read()
            .values()
            .filter(|e| include_undeployed || e.plugin().deployed)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.get_including(id, false)
    }

    /// Entry for `id`; `None` when it exists but is hidden as undeployed.
    pub fn get_including(&self, id: &str, include_undeployed: bool) -> Option<T> {
        self.entries
            .read()
            .get(id)
            .filter(|e| include_undeployed || e.plugin().deployed)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn workspace(&self, id: &str, include_undeployed: bool) -> Option<PathBuf> {
        self.get_including(id, include_undeployed)
            .map(|e| e.plugin().path.clone())
    }

    /// Content of the lone file in `schemas/`.
    pub fn get_schema(&self, id: &str) -> Option<String> {
        self.get_schema_in(id, None, false)
    }

    /// Content of the lone file in `schemas/` or `schemas/<sub_folder>/`.
    pub fn get_schema_in(
        &self,
        id: &str,
        sub_folder: Option<&str>,
        include_undeployed: bool,
    ) -> Option<String> {
        let mut dir = self.workspace(id, include_undeployed)?.join(SCHEMAS_DIR);
        if let Some(sub) = sub_folder {
            dir = dir.join(sub);
        }
        read_sole_file(&dir)
    }

    pub fn get_documentation(&self, id: &str, include_undeployed: bool) -> Option<String> {
        read_sole_file(&self.workspace(id, include_undeployed)?.join(DOCUMENTATION_DIR))
    }

    pub fn get_category(&self, id: &str, include_undeployed: bool) -> Option<String> {
        read_sole_file(&self.workspace(id, include_undeployed)?.join(CATEGORY_DIR))
            .map(|c| c.trim().to_string())
    }

    pub fn get_more_information(
        &self,
        id: &str,
        include_undeployed: bool,
    ) -> Option<MoreInformation> {
        let workspace = self.workspace(id, include_undeployed)?;
        let raw = read_sole_file(&workspace.join(MORE_INFORMATION_DIR))?;
        let mut info: MoreInformation = match serde_json::from_str(&raw) {
            Ok(info) => info,
            Err(e) => {
                warn!(id = %id, error = %e, "invalid more-information resource");
                return None;
            }
        };
        info.schema_img = info.schema_img.map(|img| workspace.join(img));
        Some(info)
    }

    /// The lone `*.png`/`*.svg` at the workspace root as a `data:` URI.
    pub fn get_icon(&self, id: &str, include_undeployed: bool) -> Option<String> {
        let workspace = self.workspace(id, include_undeployed)?;
        let icons: Vec<(PathBuf, &str)> = sole_candidates(&workspace)
            .into_iter()
            .filter_map(|p| {
                let mime = match p.extension()?.to_str()?.to_ascii_lowercase().as_str() {
                    "png" => "image/png",
                    "svg" => "image/svg+xml",
                    _ => return None,
                };
                Some((p, mime))
            })
            .collect();
        let [(path, mime)] = icons.as_slice() else {
            return None;
        };
        let bytes = fs::read(path)
            .inspect_err(|e| warn!(path = %path.display(), error = %e, "cannot read plugin icon"))
            .ok()?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Some(format!("data:{mime};base64,{encoded}"))
    }
}

/// Regular files directly inside `dir`; empty when `dir` is unreadable.
fn sole_candidates(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        })
        .unwrap_or_default()
}

/// Content of the only file in `dir`; `None` for zero or several files.
fn read_sole_file(dir: &Path) -> Option<String> {
    let files = sole_candidates(dir);
    let [file] = files.as_slice() else {
        if files.len() > 1 {
            debug!(dir = %dir.display(), files = files.len(), "ambiguous plugin resource");
        }
        return None;
    };
    fs::read_to_string(file)
        .inspect_err(|e| warn!(path = %file.display(), error = %e, "cannot read plugin resource"))
        .ok()
}
