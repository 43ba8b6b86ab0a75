// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `portico plugins` command implementation.
//!
//! Runs discovery against the configured plugin roots and prints the
//! resulting inventory, one line per plugin, or JSON with `--json`.

use std::sync::Arc;

use portico_config::PorticoConfig;
use portico_core::{Plugin, PorticoError};
use portico_plugin::PluginRegistry;
use serde::Serialize;

/// One inventory entry in `--json` output.
#[derive(Debug, Serialize)]
pub struct PluginRow {
    pub id: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub version: String,
    pub priority: i32,
    pub deployed: bool,
    pub path: String,
}

impl From<&Plugin> for PluginRow {
    fn from(plugin: &Plugin) -> Self {
        Self {
            id: plugin.id.clone(),
            plugin_type: plugin.plugin_type.clone(),
            version: plugin.manifest.version.clone(),
            priority: plugin.priority(),
            deployed: plugin.deployed,
            path: plugin.path.display().to_string(),
        }
    }
}

fn format_row(row: &PluginRow) -> String {
    let state = if row.deployed { "enabled" } else { "disabled" };
    format!(
        "{:<20} {:<24} {:<10} {:>6}  {}",
        row.plugin_type, row.id, row.version, row.priority, state
    )
}

/// Run the `portico plugins` command.
pub async fn run_plugins(config: PorticoConfig, json: bool) -> Result<(), PorticoError> {
    let registry = PluginRegistry::new(Arc::new(config), Vec::new());
    registry.start().await?;

    let rows: Vec<PluginRow> = registry.plugins().iter().map(PluginRow::from).collect();
    if json {
        let out = serde_json::to_string_pretty(&rows)
            .map_err(|e| PorticoError::Internal(format!("cannot serialize inventory: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    if rows.is_empty() {
        println!("no plugins found");
        return Ok(());
    }
    for row in &rows {
        println!("{}", format_row(row));
    }
    println!("{} plugin(s)", rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_marks_disabled_plugins() {
        let row = PluginRow {
            id: "rate-limit".to_string(),
            plugin_type: "policy".to_string(),
            version: "2.1.0".to_string(),
            priority: 1000,
            deployed: false,
            path: "/work/rate-limit".to_string(),
        };
        let line = format_row(&row);
        assert!(line.starts_with("policy"));
        assert!(line.contains("rate-limit"));
        assert!(line.ends_with("disabled"));
    }

    #[test]
    fn json_uses_type_key() {
        let row = PluginRow {
            id: "vault".to_string(),
            plugin_type: "secret-provider".to_string(),
            version: "1.0.0".to_string(),
            priority: 1000,
            deployed: true,
            path: "/work/vault".to_string(),
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["type"], "secret-provider");
    }
}
