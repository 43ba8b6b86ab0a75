// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::PorticoConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &PorticoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log_level `{}` must be one of {}",
                config.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.plugins.paths.is_empty() {
        errors.push(ConfigError::Validation {
            message: "plugins.paths must list at least one plugin root".to_string(),
        });
    }

    for (i, path) in config.plugins.paths.iter().enumerate() {
        if path.as_os_str().to_string_lossy().trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("plugins.paths[{i}] must not be empty"),
            });
        }
    }

    if let Some(id) = &config.plugins.secret_provider_load_first
        && id.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "plugins.secret_provider_load_first must not be blank when set".to_string(),
        });
    }

    if config.repository_binding.retry_delay_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "repository_binding.retry_delay_ms must be greater than 0".to_string(),
        });
    }

    for (scope, repo) in &config.repositories {
        if let Some(t) = &repo.store_type
            && t.trim().is_empty()
        {
            errors.push(ConfigError::Validation {
                message: format!("repositories.{scope}.type must not be blank when set"),
            });
        }
    }

    let mut seen_ids = HashSet::new();
    for (i, ds) in config.datasources.iter().enumerate() {
        if ds.id.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("datasources[{i}].id must not be empty"),
            });
        } else if !seen_ids.insert(ds.id.as_str()) {
            errors.push(ConfigError::Validation {
                message: format!("duplicate datasource id `{}` in [[datasources]] array", ds.id),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
