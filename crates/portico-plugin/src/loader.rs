// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archive loader: extracts a plugin package and builds its [`Plugin`] record.
//!
//! A package is a zip archive holding one top-level module jar, optional
//! `lib/` jars and optional workspace resources (`schemas/`, `docs/`, ...).
//! The manifest lives inside the module jar.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use portico_core::{Plugin, PorticoError};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::manifest::{parse_plugin_manifest, parse_properties, MANIFEST_FILE_NAME};

/// File extension of plugin packages in a plugin root.
pub const PACKAGE_EXTENSION: &str = "zip";

/// File extension of the module and its library jars.
pub const MODULE_EXTENSION: &str = "jar";

/// Default extraction directory name under a plugin root.
pub const WORK_DIR_NAME: &str = ".work";

/// Per-plugin extra classpath directory under a plugin root: `ext/<id>/`.
pub const EXT_DIR_NAME: &str = "ext";

/// Extracts and validates the packages of one plugin root.
#[derive(Debug, Clone)]
pub struct ArchiveLoader {
    root: PathBuf,
    work_root: PathBuf,
}

impl ArchiveLoader {
    /// Loader for `root`, extracting under `work_dir` or `<root>/.work`.
    pub fn new(root: impl Into<PathBuf>, work_dir: Option<&Path>) -> Self {
        let root = root.into();
        let work_root = work_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.join(WORK_DIR_NAME));
        Self { root, work_root }
    }

    /// Loader for the `index`-th configured root.
    ///
    /// A shared `work_dir` gets one sub-directory per root, so packages with
    /// the same file name in different roots never share a workspace.
    pub fn for_root(index: usize, root: impl Into<PathBuf>, work_dir: Option<&Path>) -> Self {
        let root = root.into();
        let work_dir = work_dir.map(|shared| shared.join(root_work_name(index, &root)));
        Self::new(root, work_dir.as_deref())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the packages directly inside `root`, sorted by file name.
    ///
    /// Any I/O error here is fatal for discovery.
    pub fn list_archives(root: &Path) -> Result<Vec<PathBuf>, PorticoError> {
        if !root.is_dir() {
            return Err(PorticoError::Config(format!(
                "plugin root {} is not a directory",
                root.display()
            )));
        }
        let mut archives = Vec::new();
        for entry in fs::read_dir(root).map_err(|e| PorticoError::io(root, e))? {
            let path = entry.map_err(|e| PorticoError::io(root, e))?.path();
            if path.is_file() && has_extension(&path, PACKAGE_EXTENSION) {
                archives.push(path);
            }
        }
        archives.sort();
        Ok(archives)
    }

    /// Loads one package. Failures are logged and yield `None`.
    pub fn load(&self, archive: &Path) -> Option<Plugin> {
        match self.try_load(archive) {
            Ok(plugin) => {
                info!(
                    plugin = %plugin.key(),
                    version = %plugin.manifest.version,
                    archive = %archive.display(),
                    "plugin extracted"
                );
                Some(plugin)
            }
            Err(e) => {
                warn!(archive = %archive.display(), error = %e, "skipping plugin archive");
                None
            }
        }
    }

    /// Extracts `archive`, reads its manifest, and computes its classpath.
    pub fn try_load(&self, archive: &Path) -> Result<Plugin, PorticoError> {
        let workdir = self.work_root.join(archive_name(archive));
        extract(archive, &workdir)?;

        let module = find_module(&workdir)?;
        let props = read_manifest(&module)?;
        let manifest = parse_plugin_manifest(&props)?;
        let classpath = self.classpath(&workdir, &module, &manifest.id);
        debug!(id = %manifest.id, entries = classpath.len(), "computed plugin classpath");

        let timestamp = fs::metadata(archive)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .map_err(|e| PorticoError::io(archive, e))?;

        Ok(Plugin::new(manifest, workdir, classpath, timestamp))
    }

    /// Module jar, the other jars under `workdir`, then `<root>/ext/<id>/` jars.
    fn classpath(&self, workdir: &Path, module: &Path, id: &str) -> Vec<PathBuf> {
        let mut classpath = vec![module.to_path_buf()];
        classpath.extend(jars_under(workdir).into_iter().filter(|p| p != module));

        let ext = self.root.join(EXT_DIR_NAME).join(id);
        if ext.is_dir() {
            classpath.extend(jars_under(&ext));
        }
        classpath
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn root_work_name(index: usize, root: &Path) -> String {
    match root.file_name() {
        Some(name) => format!("{index}-{}", name.to_string_lossy()),
        None => format!("{index}-root"),
    }
}

fn archive_name(archive: &Path) -> String {
    archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plugin".to_string())
}

fn archive_error(message: String, source: ZipError) -> PorticoError {
    PorticoError::Archive {
        message,
        source: Some(Box::new(source)),
    }
}

/// Unpacks `archive` into `dest`, wiping any earlier extraction first.
fn extract(archive: &Path, dest: &Path) -> Result<(), PorticoError> {
    if dest.exists() {
        fs::remove_dir_all(dest).map_err(|e| PorticoError::io(dest, e))?;
    }
    fs::create_dir_all(dest).map_err(|e| PorticoError::io(dest, e))?;

    let file = File::open(archive).map_err(|e| PorticoError::io(archive, e))?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| archive_error(format!("cannot open {}", archive.display()), e))?;
    zip.extract(dest)
        .map_err(|e| archive_error(format!("cannot extract {}", archive.display()), e))
}

/// The single jar at the top level of the extracted package.
fn find_module(workdir: &Path) -> Result<PathBuf, PorticoError> {
    let mut modules = Vec::new();
    for entry in fs::read_dir(workdir).map_err(|e| PorticoError::io(workdir, e))? {
        let path = entry.map_err(|e| PorticoError::io(workdir, e))?.path();
        if path.is_file() && has_extension(&path, MODULE_EXTENSION) {
            modules.push(path);
        }
    }
    match modules.len() {
        1 => Ok(modules.remove(0)),
        0 => Err(PorticoError::Archive {
            message: format!("no module found in {}", workdir.display()),
            source: None,
        }),
        n => Err(PorticoError::Archive {
            message: format!("{n} candidate modules found in {}", workdir.display()),
            source: None,
        }),
    }
}

fn read_manifest(
    module: &Path,
) -> Result<std::collections::BTreeMap<String, String>, PorticoError> {
    let file = File::open(module).map_err(|e| PorticoError::io(module, e))?;
    let mut jar = ZipArchive::new(file)
        .map_err(|e| archive_error(format!("cannot open module {}", module.display()), e))?;
    let mut entry = match jar.by_name(MANIFEST_FILE_NAME) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(PorticoError::Manifest(format!(
                "no manifest {MANIFEST_FILE_NAME} in {}",
                module.display()
            )));
        }
        Err(e) => {
            return Err(archive_error(
                format!("cannot read manifest from {}", module.display()),
                e,
            ));
        }
    };
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| PorticoError::io(module, e))?;
    Ok(parse_properties(&content))
}

fn jars_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), MODULE_EXTENSION))
        .map(|e| e.into_path())
        .collect()
}
