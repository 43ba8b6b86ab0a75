// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./portico.toml` > `~/.config/portico/portico.toml` >
//! `/etc/portico/portico.toml`, with `PORTICO_*` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PorticoConfig;

/// Config file name searched in every layer.
pub const CONFIG_FILE_NAME: &str = "portico.toml";

/// System-wide config path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/portico/portico.toml";

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/portico/portico.toml`
/// 3. `~/.config/portico/portico.toml`
/// 4. `./portico.toml`
/// 5. `PORTICO_*` environment variables
pub fn load_config() -> Result<PorticoConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PorticoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PorticoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PorticoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PorticoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PorticoConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(CONFIG_FILE_NAME))
        .merge(env_provider())
}

/// `~/.config/portico/portico.toml`, when a config dir exists on this platform.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("portico").join(CONFIG_FILE_NAME))
}

/// Environment provider mapping `PORTICO_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `split("_")` because keys such as
/// `fail_on_duplicate` contain underscores themselves. Keys reach the map
/// in their original case, so they are lowercased before matching.
fn env_provider() -> Env {
    Env::prefixed("PORTICO_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = if let Some(rest) = key_str.strip_prefix("repository_binding_") {
            format!("repository_binding.{rest}")
        } else if let Some(rest) = key_str.strip_prefix("plugins_") {
            format!("plugins.{rest}")
        } else {
            key_str
        };
        mapped.into()
    })
}
