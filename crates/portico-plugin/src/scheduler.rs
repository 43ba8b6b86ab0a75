// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deployment ordering and handler dispatch.
//!
//! Ordering happens in two passes. The base order sorts by manifest priority,
//! then by the category table ([`CATEGORY_PRIORITY`]), keeping discovery order
//! for everything else. The walk then deploys each plugin's requirements (its
//! manifest dependency edges) before the plugin itself.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use portico_core::{DeploymentHandler, KnownPluginType, Plugin, PluginKey, PorticoError};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::registry::DiscoveryEvent;

/// Types that deploy ahead of all others, in this order.
pub const CATEGORY_PRIORITY: [KnownPluginType; 7] = [
    KnownPluginType::SecretProvider,
    KnownPluginType::Cluster,
    KnownPluginType::Cache,
    KnownPluginType::Repository,
    KnownPluginType::DataPlane,
    KnownPluginType::Alert,
    KnownPluginType::Cockpit,
];

/// Position in [`CATEGORY_PRIORITY`]; types outside the table share the last rank.
fn category_rank(plugin_type: &str) -> usize {
    CATEGORY_PRIORITY
        .iter()
        .position(|t| t.as_ref() == plugin_type)
        .unwrap_or(CATEGORY_PRIORITY.len())
}

fn compare(a: &Plugin, b: &Plugin) -> Ordering {
    a.priority()
        .cmp(&b.priority())
        .then_with(|| category_rank(&a.plugin_type).cmp(&category_rank(&b.plugin_type)))
}

/// Sorts `plugins` into the base order (stable).
///
/// With `load_first`, that secret provider then moves to the slot of the
/// first secret provider, ahead of every other one and of any plugin sorted
/// between them, whatever its priority.
pub fn base_order(plugins: &[Plugin], load_first: Option<&str>) -> Vec<Plugin> {
    let mut ordered = plugins.to_vec();
    ordered.sort_by(compare);

    let secret_provider = KnownPluginType::SecretProvider.as_ref();
    if let Some(id) = load_first {
        let first_slot = ordered
            .iter()
            .position(|p| p.plugin_type == secret_provider);
        let current = ordered
            .iter()
            .position(|p| p.plugin_type == secret_provider && p.id == id);
        if let (Some(first_slot), Some(current)) = (first_slot, current)
            && current > first_slot
        {
            let plugin = ordered.remove(current);
            ordered.insert(first_slot, plugin);
        }
    }
    ordered
}

/// For each plugin, the other plugins its dependency edges match, in `ordered` order.
pub fn requirements(ordered: &[Plugin]) -> HashMap<PluginKey, Vec<PluginKey>> {
    ordered
        .iter()
        .map(|plugin| {
            let required = ordered
                .iter()
                .filter(|other| *other != plugin)
                .filter(|other| plugin.manifest.dependencies.iter().any(|e| e.matches(other)))
                .map(Plugin::key)
                .collect();
            (plugin.key(), required)
        })
        .collect()
}

/// Full deployment order: requirements first, then the base order.
///
/// Fails with [`PorticoError::DependencyCycle`] before anything is deployed
/// when the requirements form a cycle.
pub fn deployment_order(
    plugins: &[Plugin],
    load_first: Option<&str>,
) -> Result<Vec<Plugin>, PorticoError> {
    let ordered = base_order(plugins, load_first);
    let requires = requirements(&ordered);
    let by_key: HashMap<PluginKey, &Plugin> = ordered.iter().map(|p| (p.key(), p)).collect();

    let mut walk = Walk {
        requires: &requires,
        done: HashSet::new(),
        stack: Vec::new(),
        out: Vec::with_capacity(ordered.len()),
    };
    for plugin in &ordered {
        walk.visit(&plugin.key())?;
    }

    Ok(walk
        .out
        .into_iter()
        .filter_map(|key| by_key.get(&key).map(|p| (*p).clone()))
        .collect())
}

struct Walk<'a> {
    requires: &'a HashMap<PluginKey, Vec<PluginKey>>,
    done: HashSet<PluginKey>,
    stack: Vec<PluginKey>,
    out: Vec<PluginKey>,
}

impl Walk<'_> {
    fn visit(&mut self, key: &PluginKey) -> Result<(), PorticoError> {
        if self.done.contains(key) {
            return Ok(());
        }
        if let Some(pos) = self.stack.iter().position(|k| k == key) {
            let mut path = self.stack[pos..].to_vec();
            path.push(key.clone());
            return Err(PorticoError::DependencyCycle { path });
        }

        self.stack.push(key.clone());
        let requires = self.requires;
        for dependency in requires.get(key).into_iter().flatten() {
            self.visit(dependency)?;
        }
        self.stack.pop();

        self.done.insert(key.clone());
        self.out.push(key.clone());
        Ok(())
    }
}

/// Outcome of one deployment walk.
#[derive(Debug, Default, Clone)]
pub struct DeploymentReport {
    /// Plugins walked, in dispatch order.
    pub order: Vec<PluginKey>,
    /// Plugins whose handler returned an error, with the error text.
    pub failed: Vec<(PluginKey, String)>,
}

/// Drives handlers over the inventory in deployment order.
pub struct PluginDeployer {
    handlers: Vec<Arc<dyn DeploymentHandler>>,
    load_first: Option<String>,
}

impl PluginDeployer {
    /// Deployer with no handlers. `load_first` is the secret-provider override.
    pub fn new(load_first: Option<String>) -> Self {
        Self {
            handlers: Vec::new(),
            load_first,
        }
    }

    /// Appends a handler; handlers run in registration order.
    pub fn register(&mut self, handler: Arc<dyn DeploymentHandler>) {
        self.handlers.push(handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn DeploymentHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Collects discovery events until `Ended`, then deploys what was discovered.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<DiscoveryEvent>,
    ) -> Result<DeploymentReport, PorticoError> {
        let mut discovered = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                DiscoveryEvent::Discovered(plugin) => discovered.push(plugin),
                DiscoveryEvent::Ended => return self.deploy(&discovered).await,
            }
        }
        Err(PorticoError::Internal(
            "discovery channel closed before discovery ended".to_string(),
        ))
    }

    /// Dispatches every plugin to its matching handlers, sequentially.
    ///
    /// A handler error is logged and ends that plugin's dispatch; the walk
    /// goes on with the next plugin.
    pub async fn deploy(&self, plugins: &[Plugin]) -> Result<DeploymentReport, PorticoError> {
        let order = deployment_order(plugins, self.load_first.as_deref())?;
        let mut report = DeploymentReport::default();

        for plugin in &order {
            let key = plugin.key();
            debug!(plugin = %key, deployed = plugin.deployed, "dispatching plugin");
            report.order.push(key.clone());

            let matching = self.handlers.iter().filter(|h| {
                h.can_handle(plugin) && (plugin.deployed || h.accepts_undeployed())
            });
            for handler in matching {
                if let Err(e) = handler.handle(plugin).await {
                    error!(
                        plugin = %key,
                        handler = handler.name(),
                        error = %e,
                        "plugin deployment failed"
                    );
                    report.failed.push((key.clone(), e.to_string()));
                    break;
                }
            }
        }

        info!(
            plugins = report.order.len(),
            failed = report.failed.len(),
            "plugin deployment finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portico_core::types::{DependencyEdge, PluginManifest, DEFAULT_PRIORITY};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn plugin(id: &str, plugin_type: &str, priority: i32, deps: &[(&str, &str)]) -> Plugin {
        let manifest = PluginManifest {
            id: id.to_string(),
            name: id.to_string(),
            version: "1.0.0".to_string(),
            description: "test".to_string(),
            class_name: format!("io.test.{id}"),
            plugin_type: plugin_type.to_string(),
            category: None,
            feature: None,
            priority,
            dependencies: deps.iter().map(|(t, i)| DependencyEdge::new(*t, *i)).collect(),
            properties: BTreeMap::new(),
        };
        Plugin::new(manifest, PathBuf::new(), vec![], Utc::now())
    }

    fn ids(plugins: &[Plugin]) -> Vec<&str> {
        plugins.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn priority_beats_category_table() {
        let plugins = vec![
            plugin("repo", "repository", DEFAULT_PRIORITY, &[]),
            plugin("early", "policy", 10, &[]),
        ];
        assert_eq!(ids(&base_order(&plugins, None)), vec!["early", "repo"]);
    }

    #[test]
    fn category_table_orders_known_types() {
        let plugins = vec![
            plugin("cockpit", "cockpit", DEFAULT_PRIORITY, &[]),
            plugin("custom", "custom", DEFAULT_PRIORITY, &[]),
            plugin("repo", "repository", DEFAULT_PRIORITY, &[]),
            plugin("vault", "secret-provider", DEFAULT_PRIORITY, &[]),
            plugin("redis", "cache", DEFAULT_PRIORITY, &[]),
        ];
        assert_eq!(
            ids(&base_order(&plugins, None)),
            vec!["vault", "redis", "repo", "cockpit", "custom"]
        );
    }

    #[test]
    fn unknown_types_keep_discovery_order() {
        let plugins = vec![
            plugin("z", "policy", DEFAULT_PRIORITY, &[]),
            plugin("a", "resource", DEFAULT_PRIORITY, &[]),
            plugin("m", "notifier", DEFAULT_PRIORITY, &[]),
        ];
        assert_eq!(ids(&base_order(&plugins, None)), vec!["z", "a", "m"]);
    }

    #[test]
    fn load_first_secret_provider_leads_its_category() {
        let plugins = vec![
            plugin("repo", "repository", DEFAULT_PRIORITY, &[]),
            plugin("aws", "secret-provider", DEFAULT_PRIORITY, &[]),
            plugin("kube", "secret-provider", DEFAULT_PRIORITY, &[]),
            plugin("vault", "secret-provider", DEFAULT_PRIORITY, &[]),
        ];
        assert_eq!(
            ids(&base_order(&plugins, Some("vault"))),
            vec!["vault", "aws", "kube", "repo"]
        );
    }

    #[test]
    fn load_first_overrides_priority_of_plugins_in_between() {
        let plugins = vec![
            plugin("aws", "secret-provider", 10, &[]),
            plugin("rate-limit", "policy", 20, &[]),
            plugin("vault", "secret-provider", 30, &[]),
            plugin("cors", "policy", 40, &[]),
        ];
        assert_eq!(
            ids(&base_order(&plugins, Some("vault"))),
            vec!["vault", "aws", "rate-limit", "cors"]
        );
    }

    #[test]
    fn load_first_ignores_other_types_with_that_id() {
        let plugins = vec![
            plugin("aws", "secret-provider", DEFAULT_PRIORITY, &[]),
            plugin("vault", "policy", DEFAULT_PRIORITY, &[]),
        ];
        assert_eq!(
            ids(&base_order(&plugins, Some("vault"))),
            vec!["aws", "vault"]
        );
    }

    #[test]
    fn dependency_chain_deploys_leaf_first() {
        let plugins = vec![
            plugin("a", "policy", DEFAULT_PRIORITY, &[("policy", "b")]),
            plugin("b", "policy", DEFAULT_PRIORITY, &[("policy", "c")]),
            plugin("c", "policy", DEFAULT_PRIORITY, &[]),
        ];
        let order = deployment_order(&plugins, None).unwrap();
        assert_eq!(ids(&order), vec!["c", "b", "a"]);
    }

    #[test]
    fn wildcard_dependency_pulls_every_plugin_of_type() {
        let plugins = vec![
            plugin("gw", "policy", 1, &[("connector", "*")]),
            plugin("kafka", "connector", DEFAULT_PRIORITY, &[]),
            plugin("mqtt", "connector", DEFAULT_PRIORITY, &[]),
        ];
        let order = deployment_order(&plugins, None).unwrap();
        assert_eq!(ids(&order), vec!["kafka", "mqtt", "gw"]);
    }

    #[test]
    fn wildcard_on_own_type_does_not_require_itself() {
        let plugins = vec![plugin("a", "policy", DEFAULT_PRIORITY, &[("policy", "*")])];
        assert_eq!(ids(&deployment_order(&plugins, None).unwrap()), vec!["a"]);
    }

    #[test]
    fn cycle_is_reported_with_its_path() {
        let plugins = vec![
            plugin("a", "policy", DEFAULT_PRIORITY, &[("policy", "b")]),
            plugin("b", "policy", DEFAULT_PRIORITY, &[("policy", "a")]),
        ];
        match deployment_order(&plugins, None) {
            Err(PorticoError::DependencyCycle { path }) => {
                let ids: Vec<_> = path.iter().map(|k| k.id.as_str()).collect();
                assert_eq!(ids, vec!["a", "b", "a"]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }
}
