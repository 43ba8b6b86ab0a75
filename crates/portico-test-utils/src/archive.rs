// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin package fixtures.
//!
//! A package is a zip holding `<id>-<version>.jar` (the module, with
//! `plugin.properties` and one `.class` entry per symbol), optional
//! `lib/*.jar` files, and arbitrary workspace files.

use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const MANIFEST_ENTRY: &str = "plugin.properties";
const SYMBOL_BYTES: &[u8] = b"\xca\xfe\xba\xbe";

fn zip_err(e: zip::result::ZipError) -> io::Error {
    io::Error::other(e)
}

fn symbol_entry(symbol: &str) -> String {
    format!("{}.class", symbol.replace('.', "/"))
}

/// Writes a jar holding one entry per symbol plus any extra raw entries.
fn jar_bytes(symbols: &[String], extra: &[(String, Vec<u8>)]) -> io::Result<Vec<u8>> {
    let mut jar = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in extra {
        jar.start_file(name.as_str(), options).map_err(zip_err)?;
        jar.write_all(content)?;
    }
    for symbol in symbols {
        jar.start_file(symbol_entry(symbol), options).map_err(zip_err)?;
        jar.write_all(SYMBOL_BYTES)?;
    }
    Ok(jar.finish().map_err(zip_err)?.into_inner())
}

/// Builder for a plugin package written to disk.
///
/// ```no_run
/// use portico_test_utils::PluginArchiveBuilder;
///
/// let dir = tempfile::tempdir().unwrap();
/// let archive = PluginArchiveBuilder::new("rate-limit", "policy")
///     .priority(10)
///     .depends_on("repository:mongodb")
///     .file("schemas/schema-form.json", "{}")
///     .write_to(dir.path())
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PluginArchiveBuilder {
    id: String,
    plugin_type: String,
    class_name: String,
    version: String,
    priority: Option<i32>,
    dependencies: Vec<String>,
    properties: Vec<(String, String)>,
    symbols: Vec<String>,
    libs: Vec<(String, Vec<String>)>,
    files: Vec<(String, Vec<u8>)>,
    archive_name: Option<String>,
    omitted_fields: Vec<String>,
    with_module: bool,
    with_manifest: bool,
}

impl PluginArchiveBuilder {
    /// Package for plugin `id` of `plugin_type`, with class `io.portico.test.<id>`.
    pub fn new(id: impl Into<String>, plugin_type: impl Into<String>) -> Self {
        let id = id.into();
        let class_name = format!("io.portico.test.{}", id.replace('-', "_"));
        Self {
            id,
            plugin_type: plugin_type.into(),
            class_name,
            version: "1.0.0".to_string(),
            priority: None,
            dependencies: Vec::new(),
            properties: Vec::new(),
            symbols: Vec::new(),
            libs: Vec::new(),
            files: Vec::new(),
            archive_name: None,
            omitted_fields: Vec::new(),
            with_module: true,
            with_manifest: true,
        }
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Adds a `type[:id]` dependency edge.
    pub fn depends_on(mut self, edge: impl Into<String>) -> Self {
        self.dependencies.push(edge.into());
        self
    }

    /// Adds a custom manifest property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Adds a symbol to the module jar, besides the plugin class.
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbols.push(symbol.into());
        self
    }

    /// Adds `lib/<name>` exporting `symbols`.
    pub fn lib<I, S>(mut self, name: impl Into<String>, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.libs
            .push((name.into(), symbols.into_iter().map(Into::into).collect()));
        self
    }

    /// Adds a workspace file at `path` inside the package.
    pub fn file(mut self, path: impl Into<String>, content: impl AsRef<[u8]>) -> Self {
        self.files.push((path.into(), content.as_ref().to_vec()));
        self
    }

    /// File name of the package; defaults to `<id>-<version>.zip`.
    pub fn archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_name = Some(name.into());
        self
    }

    /// Leaves a required manifest key out.
    pub fn without_field(mut self, key: impl Into<String>) -> Self {
        self.omitted_fields.push(key.into());
        self
    }

    pub fn without_module(mut self) -> Self {
        self.with_module = false;
        self
    }

    pub fn without_manifest(mut self) -> Self {
        self.with_manifest = false;
        self
    }

    /// Symbol name of the plugin class.
    pub fn class(&self) -> &str {
        &self.class_name
    }

    /// The `plugin.properties` content this builder writes.
    pub fn manifest_text(&self) -> String {
        let mut lines = vec!["# generated fixture".to_string()];
        let required = [
            ("id", self.id.as_str()),
            ("name", self.id.as_str()),
            ("version", self.version.as_str()),
            ("description", "Fixture plugin"),
            ("class", self.class_name.as_str()),
            ("type", self.plugin_type.as_str()),
        ];
        for (key, value) in required {
            if !self.omitted_fields.iter().any(|f| f == key) {
                lines.push(format!("{key}={value}"));
            }
        }
        if let Some(priority) = self.priority {
            lines.push(format!("priority={priority}"));
        }
        if !self.dependencies.is_empty() {
            lines.push(format!("dependencies={}", self.dependencies.join(",")));
        }
        for (key, value) in &self.properties {
            lines.push(format!("{key}={value}"));
        }
        lines.join("\n") + "\n"
    }

    fn module_bytes(&self) -> io::Result<Vec<u8>> {
        let mut symbols = vec![self.class_name.clone()];
        symbols.extend(self.symbols.iter().cloned());
        let manifest = if self.with_manifest {
            vec![(MANIFEST_ENTRY.to_string(), self.manifest_text().into_bytes())]
        } else {
            Vec::new()
        };
        jar_bytes(&symbols, &manifest)
    }

    /// Writes the package into `dir` and returns its path.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        let name = self
            .archive_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}.zip", self.id, self.version));
        let path = dir.join(name);

        let mut zip = ZipWriter::new(File::create(&path)?);
        let options = SimpleFileOptions::default();
        if self.with_module {
            zip.start_file(format!("{}-{}.jar", self.id, self.version), options)
                .map_err(zip_err)?;
            zip.write_all(&self.module_bytes()?)?;
        }
        for (lib, symbols) in &self.libs {
            zip.start_file(format!("lib/{lib}"), options).map_err(zip_err)?;
            zip.write_all(&jar_bytes(symbols, &[])?)?;
        }
        for (file, content) in &self.files {
            zip.start_file(file.as_str(), options).map_err(zip_err)?;
            zip.write_all(content)?;
        }
        zip.finish().map_err(zip_err)?;
        Ok(path)
    }
}

/// Writes a `.zip` file that is not a zip archive.
pub fn write_corrupt_archive(dir: &Path, name: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, b"this is not a zip archive")?;
    Ok(path)
}

/// Writes `ext/<id>/<name>` exporting `symbols` under a plugin root.
pub fn write_ext_jar(root: &Path, id: &str, name: &str, symbols: &[&str]) -> io::Result<PathBuf> {
    let dir = root.join("ext").join(id);
    fs::create_dir_all(&dir)?;
    let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
    let path = dir.join(name);
    fs::write(&path, jar_bytes(&symbols, &[])?)?;
    Ok(path)
}
