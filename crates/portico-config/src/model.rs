// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Portico plugin runtime.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so misspelled keys are
//! rejected at startup with a suggestion instead of being silently ignored.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Free-form settings handed to plugins (repository scopes, datasources).
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// Top-level Portico configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PorticoConfig {
    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Plugin discovery settings.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Per-plugin enable flags, keyed `<type>.<id>`.
    #[serde(default)]
    pub overrides: HashMap<String, HashMap<String, PluginOverride>>,

    /// Backing-store type and settings per repository scope.
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositoryScopeConfig>,

    /// Retry policy of the repository-scope binder.
    #[serde(default)]
    pub repository_binding: RepositoryBindingConfig,

    /// Declared datasource instances.
    #[serde(default)]
    pub datasources: Vec<DatasourceConfig>,
}

impl Default for PorticoConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            plugins: PluginsConfig::default(),
            overrides: HashMap::new(),
            repositories: BTreeMap::new(),
            repository_binding: RepositoryBindingConfig::default(),
            datasources: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl PorticoConfig {
    /// Resolves the `<type>.<id>.enabled` flag.
    ///
    /// An explicit override wins, then the per-type default, then `true`.
    pub fn is_plugin_enabled(&self, plugin_type: &str, id: &str) -> bool {
        self.overrides
            .get(plugin_type)
            .and_then(|by_id| by_id.get(id))
            .and_then(|o| o.enabled)
            .or_else(|| self.plugins.type_defaults.get(plugin_type).copied())
            .unwrap_or(true)
    }

    /// Configured backing-store type for a repository scope, if non-blank.
    pub fn repository_type(&self, scope: &str) -> Option<&str> {
        self.repositories
            .get(scope)
            .and_then(|s| s.store_type.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Plugin discovery configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Plugin root directories. At least one is required to start discovery.
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Shared extraction root. Defaults to `<root>/.work` per root.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Abort discovery when two archives share `(id, type)`.
    #[serde(default)]
    pub fail_on_duplicate: bool,

    /// Secret-provider id that deploys before every other secret provider.
    #[serde(default)]
    pub secret_provider_load_first: Option<String>,

    /// Extraction worker count. `0` means twice the available parallelism.
    #[serde(default)]
    pub workers: usize,

    /// Default of the enable flag per plugin type.
    #[serde(default)]
    pub type_defaults: HashMap<String, bool>,
}

impl PluginsConfig {
    /// Effective worker pool size.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get() * 2)
            .unwrap_or(2)
    }
}

/// Enable flag for a single plugin.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginOverride {
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Backing-store selection for one repository scope.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryScopeConfig {
    /// Repository plugin type that must back this scope (e.g. "mongodb").
    #[serde(rename = "type", default)]
    pub store_type: Option<String>,

    /// Settings passed to the repository when the scope is bound.
    #[serde(default)]
    pub settings: Settings,
}

/// Retry policy for binding repository scopes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryBindingConfig {
    /// Delay between bind attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Attempts before giving up. `0` retries forever.
    #[serde(default)]
    pub max_attempts: u32,
}

impl Default for RepositoryBindingConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            max_attempts: 0,
        }
    }
}

fn default_retry_delay_ms() -> u64 {
    5000
}

/// A declared datasource instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatasourceConfig {
    /// Id of the datasource plugin providing this instance.
    pub id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub settings: Settings,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_flag_defaults_to_true() {
        let config = PorticoConfig::default();
        assert!(config.is_plugin_enabled("policy", "rate-limit"));
    }

    #[test]
    fn override_beats_type_default() {
        let toml_str = r#"
[plugins]
type_defaults = { datasource = false }

[overrides.datasource.mongo]
enabled = true

[overrides.policy.rate-limit]
enabled = false
"#;
        let config: PorticoConfig = toml::from_str(toml_str).unwrap();
        assert!(config.is_plugin_enabled("datasource", "mongo"));
        assert!(!config.is_plugin_enabled("datasource", "jdbc"));
        assert!(!config.is_plugin_enabled("policy", "rate-limit"));
        assert!(config.is_plugin_enabled("policy", "cors"));
    }

    #[test]
    fn override_without_enabled_falls_through() {
        let toml_str = r#"
[plugins]
type_defaults = { notifier = false }

[overrides.notifier.email]
"#;
        let config: PorticoConfig = toml::from_str(toml_str).unwrap();
        assert!(!config.is_plugin_enabled("notifier", "email"));
    }

    #[test]
    fn blank_repository_type_reads_as_missing() {
        let toml_str = r#"
[repositories.management]
type = "mongodb"

[repositories.analytics]
type = "  "
"#;
        let config: PorticoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.repository_type("management"), Some("mongodb"));
        assert_eq!(config.repository_type("analytics"), None);
        assert_eq!(config.repository_type("rate_limit"), None);
    }

    #[test]
    fn explicit_worker_count_is_kept() {
        let plugins = PluginsConfig {
            workers: 3,
            ..Default::default()
        };
        assert_eq!(plugins.worker_count(), 3);
        assert!(PluginsConfig::default().worker_count() >= 2);
    }

    #[test]
    fn binding_defaults_to_five_seconds_forever() {
        let config = PorticoConfig::default();
        assert_eq!(config.repository_binding.retry_delay_ms, 5000);
        assert_eq!(config.repository_binding.max_attempts, 0);
    }

    #[test]
    fn datasource_enabled_defaults_to_true() {
        let toml_str = r#"
[[datasources]]
id = "mongo"
settings = { uri = "mongodb://localhost" }
"#;
        let config: PorticoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.datasources.len(), 1);
        assert!(config.datasources[0].enabled);
        assert_eq!(
            config.datasources[0].settings.get("uri").and_then(|v| v.as_str()),
            Some("mongodb://localhost")
        );
    }
}
