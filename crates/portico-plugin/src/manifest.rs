// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin manifest parsing from `plugin.properties`.
//!
//! The manifest is a flat key/value file. Reserved keys become typed
//! [`PluginManifest`] fields; every other key lands in `properties`.

use std::collections::BTreeMap;

use portico_core::types::{DependencyEdge, PluginManifest, DEFAULT_PRIORITY, WILDCARD_ID};
use portico_core::PorticoError;

/// Manifest resource name inside the module jar.
pub const MANIFEST_FILE_NAME: &str = "plugin.properties";

/// Keys that must be present and non-blank.
pub const REQUIRED_KEYS: [&str; 6] = ["id", "description", "class", "name", "version", "type"];

const RESERVED_KEYS: [&str; 10] = [
    "id",
    "name",
    "version",
    "description",
    "class",
    "type",
    "category",
    "feature",
    "priority",
    "dependencies",
];

/// Parses properties text: `key=value`, `key: value` or `key value` lines,
/// `#`/`!` comments, trailing-backslash continuation and backslash escapes
/// (`\\`, `\=`, `\:`, `\t`, `\n`, `\uXXXX`). Later keys win.
pub fn parse_properties(content: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    let mut logical = String::new();

    for raw in content.lines() {
        let line = raw.trim_start();
        if logical.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }
        if ends_with_continuation(line) {
            logical.push_str(&line[..line.len() - 1]);
            continue;
        }
        logical.push_str(line);
        let (key, value) = split_entry(&logical);
        props.insert(key, value);
        logical.clear();
    }

    if !logical.is_empty() {
        let (key, value) = split_entry(&logical);
        props.insert(key, value);
    }

    props
}

// An odd run of trailing backslashes continues the line; `\\` is a literal one.
fn ends_with_continuation(line: &str) -> bool {
    line.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

// The key ends at the first unescaped `=`, `:` or whitespace; one separator
// is then skipped.
fn split_entry(line: &str) -> (String, String) {
    let is_separator = |c: char| c == '=' || c == ':';
    let mut key_end = line.len();
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if is_separator(c) || c.is_whitespace() {
            key_end = i;
            break;
        }
    }
    let rest = line[key_end..].trim_start();
    let value = rest.strip_prefix(is_separator).unwrap_or(rest);
    (unescape(&line[..key_end]), unescape(value.trim()))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        chars.nth(3);
                    }
                    _ => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Parses the `dependencies` property: comma-separated `type[:id]` entries.
///
/// A bare `type` depends on every plugin of that type.
pub fn parse_dependencies(value: &str) -> Vec<DependencyEdge> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once(':') {
            Some((plugin_type, id)) => {
                let (plugin_type, id) = (plugin_type.trim(), id.trim());
                if plugin_type.is_empty() {
                    return None;
                }
                let id = if id.is_empty() { WILDCARD_ID } else { id };
                Some(DependencyEdge::new(plugin_type, id))
            }
            None => Some(DependencyEdge::new(entry, WILDCARD_ID)),
        })
        .collect()
}

/// Validates the required keys and builds a [`PluginManifest`].
pub fn parse_plugin_manifest(
    props: &BTreeMap<String, String>,
) -> Result<PluginManifest, PorticoError> {
    let missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| props.get(*key).is_none_or(|v| v.trim().is_empty()))
        .collect();
    if !missing.is_empty() {
        return Err(PorticoError::Manifest(format!(
            "invalid manifest: missing required field(s) {}",
            missing.join(", ")
        )));
    }

    let required = |key: &str| props[key].trim().to_string();
    let optional = |key: &str| {
        props
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let priority = match optional("priority") {
        Some(raw) => raw.parse::<i32>().map_err(|_| {
            PorticoError::Manifest(format!("invalid manifest: priority `{raw}` is not an integer"))
        })?,
        None => DEFAULT_PRIORITY,
    };

    let properties = props
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(PluginManifest {
        id: required("id"),
        name: required("name"),
        version: required("version"),
        description: required("description"),
        class_name: required("class"),
        plugin_type: required("type"),
        category: optional("category"),
        feature: optional("feature"),
        priority,
        dependencies: optional("dependencies")
            .map(|d| parse_dependencies(&d))
            .unwrap_or_default(),
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
# Rate limiting policy
id=rate-limit
name = Rate Limit
version: 2.1.0
description=Limits request rate \
    per consumer
class=io.portico.policy.RateLimitPolicy
type=policy
category=security
priority=10
dependencies=repository:redis, cache
x-icon-color=blue
"#;

    #[test]
    fn parses_all_separators_and_continuations() {
        let props = parse_properties(VALID);
        assert_eq!(props["id"], "rate-limit");
        assert_eq!(props["name"], "Rate Limit");
        assert_eq!(props["version"], "2.1.0");
        assert_eq!(props["description"], "Limits request rate per consumer");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let props = parse_properties("# comment\n! other\n\nkey value with spaces\n");
        assert_eq!(props.len(), 1);
        assert_eq!(props["key"], "value with spaces");
    }

    #[test]
    fn escaped_trailing_backslash_is_not_a_continuation() {
        let props = parse_properties("dir=C:\\\\\nnext=value\n");
        assert_eq!(props["dir"], "C:\\");
        assert_eq!(props["next"], "value");
    }

    #[test]
    fn escapes_are_decoded_in_keys_and_values() {
        let props = parse_properties(
            "path\\:with\\=separators = a\\:b\nunicode=caf\\u00e9\ntabbed=one\\ttwo\nodd=\\q\n",
        );
        assert_eq!(props["path:with=separators"], "a:b");
        assert_eq!(props["unicode"], "café");
        assert_eq!(props["tabbed"], "one\ttwo");
        assert_eq!(props["odd"], "q");
    }

    #[test]
    fn continuation_joins_after_escaped_backslash_pair() {
        let props = parse_properties("key=a\\\\\\\n    b\n");
        assert_eq!(props["key"], "a\\b");
    }

    #[test]
    fn builds_manifest_with_custom_properties() {
        let manifest = parse_plugin_manifest(&parse_properties(VALID)).unwrap();
        assert_eq!(manifest.id, "rate-limit");
        assert_eq!(manifest.plugin_type, "policy");
        assert_eq!(manifest.class_name, "io.portico.policy.RateLimitPolicy");
        assert_eq!(manifest.category.as_deref(), Some("security"));
        assert_eq!(manifest.priority, 10);
        assert_eq!(
            manifest.dependencies,
            vec![
                DependencyEdge::new("repository", "redis"),
                DependencyEdge::new("cache", "*"),
            ]
        );
        assert_eq!(manifest.properties.len(), 1);
        assert_eq!(manifest.properties["x-icon-color"], "blue");
    }

    #[test]
    fn priority_defaults_to_1000() {
        let props = parse_properties(
            "id=a\nname=A\nversion=1\ndescription=d\nclass=io.A\ntype=policy\n",
        );
        let manifest = parse_plugin_manifest(&props).unwrap();
        assert_eq!(manifest.priority, DEFAULT_PRIORITY);
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.feature.is_none());
    }

    #[test]
    fn blank_required_field_is_rejected() {
        let props = parse_properties("id=a\nname=\nversion=1\ndescription=d\ntype=policy\n");
        let err = parse_plugin_manifest(&props).unwrap_err().to_string();
        assert!(err.contains("invalid manifest"));
        assert!(err.contains("class"));
        assert!(err.contains("name"));
    }

    #[test]
    fn non_numeric_priority_is_rejected() {
        let props = parse_properties(
            "id=a\nname=A\nversion=1\ndescription=d\nclass=io.A\ntype=policy\npriority=high\n",
        );
        assert!(parse_plugin_manifest(&props).is_err());
    }

    #[test]
    fn dependency_list_tolerates_spacing_and_empty_ids() {
        let edges = parse_dependencies(" secret-provider : vault ,, cluster:, :x ");
        assert_eq!(
            edges,
            vec![
                DependencyEdge::new("secret-provider", "vault"),
                DependencyEdge::new("cluster", "*"),
            ]
        );
    }
}
