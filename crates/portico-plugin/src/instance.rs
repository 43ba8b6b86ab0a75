// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin instantiation through isolation boundaries.
//!
//! A plugin's `class` is a symbol name. Instantiating it means resolving the
//! symbol through the plugin's boundary, then calling the constructor that
//! the host registered for that symbol in a [`ConstructorRegistry`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use portico_config::model::Settings;
use portico_core::{DeploymentHandler, IsolationBoundary, Plugin, PorticoError, SymbolHandle};
use tracing::{debug, info, warn};

use crate::boundary::BoundaryFactory;
use crate::typed::{PluginRecord, TypedPluginRegistry};

/// Manifest property naming the plugin's configuration type symbol.
pub const CONFIGURATION_PROPERTY: &str = "configuration";

/// Manifest property naming the plugin's configuration mapper symbol.
pub const MAPPER_PROPERTY: &str = "mapper";

/// Everything a constructor gets to build a plugin instance.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    pub plugin: &'a Plugin,
    /// The resolved class symbol.
    pub symbol: &'a SymbolHandle,
    pub settings: &'a Settings,
}

/// Builds one instance of `I` from a [`PluginContext`].
pub type Constructor<I> =
    Arc<dyn Fn(&PluginContext<'_>) -> Result<Arc<I>, PorticoError> + Send + Sync>;

/// Constructors keyed by symbol name.
pub struct ConstructorRegistry<I: ?Sized> {
    constructors: RwLock<HashMap<String, Constructor<I>>>,
}

impl<I: ?Sized> Default for ConstructorRegistry<I> {
    fn default() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }
}

impl<I: ?Sized> ConstructorRegistry<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constructor for `symbol`, replacing any earlier one.
    pub fn register<F>(&self, symbol: impl Into<String>, constructor: F)
    where
        F: Fn(&PluginContext<'_>) -> Result<Arc<I>, PorticoError> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .insert(symbol.into(), Arc::new(constructor));
    }

    pub fn get(&self, symbol: &str) -> Option<Constructor<I>> {
        self.constructors.read().get(symbol).cloned()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.constructors.read().contains_key(symbol)
    }

    /// Resolves `plugin.class_name` through `boundary` and runs its constructor.
    pub fn build(
        &self,
        boundary: &dyn IsolationBoundary,
        plugin: &Plugin,
        settings: &Settings,
    ) -> Result<Arc<I>, PorticoError> {
        let symbol = boundary.load_symbol(&plugin.class_name)?;
        let constructor = self
            .get(&symbol.name)
            .ok_or_else(|| PorticoError::Instantiation {
                symbol: symbol.name.clone(),
                message: "no constructor registered for this symbol".to_string(),
            })?;
        constructor(&PluginContext {
            plugin,
            symbol: &symbol,
            settings,
        })
    }
}

/// Built instances, split by the plugin's deployed flag.
pub struct InstanceRegistry<I: ?Sized> {
    deployed: DashMap<String, Arc<I>>,
    undeployed: DashMap<String, Arc<I>>,
}

impl<I: ?Sized> Default for InstanceRegistry<I> {
    fn default() -> Self {
        Self {
            deployed: DashMap::new(),
            undeployed: DashMap::new(),
        }
    }
}

impl<I: ?Sized> InstanceRegistry<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, deployed: bool, instance: Arc<I>) {
        let bucket = if deployed {
            &self.deployed
        } else {
            &self.undeployed
        };
        bucket.insert(id.into(), instance);
    }

    /// Instance of a deployed plugin.
    pub fn get(&self, id: &str) -> Option<Arc<I>> {
        self.deployed.get(id).map(|i| Arc::clone(i.value()))
    }

    pub fn get_undeployed(&self, id: &str) -> Option<Arc<I>> {
        self.undeployed.get(id).map(|i| Arc::clone(i.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.deployed.contains_key(id) || self.undeployed.contains_key(id)
    }

    /// Ids of deployed instances, sorted.
    pub fn deployed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.deployed.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

/// Generic handler for one plugin type.
///
/// Registers every plugin of its type (deployed or not) in a typed registry,
/// then builds the plugin's instance once. A plugin whose boundary cannot be
/// created is skipped; a plugin whose instance cannot be built stays
/// registered without an instance.
pub struct CategoryHandler<I: ?Sized> {
    name: String,
    plugin_type: String,
    host: Arc<dyn IsolationBoundary>,
    boundaries: Arc<dyn BoundaryFactory>,
    constructors: Arc<ConstructorRegistry<I>>,
    plugins: Arc<TypedPluginRegistry<PluginRecord>>,
    instances: Arc<InstanceRegistry<I>>,
}

impl<I: ?Sized + Send + Sync + 'static> CategoryHandler<I> {
    pub fn new(
        plugin_type: impl Into<String>,
        host: Arc<dyn IsolationBoundary>,
        boundaries: Arc<dyn BoundaryFactory>,
        constructors: Arc<ConstructorRegistry<I>>,
    ) -> Self {
        let plugin_type = plugin_type.into();
        Self {
            name: format!("{plugin_type}-handler"),
            plugin_type,
            host,
            boundaries,
            constructors,
            plugins: Arc::new(TypedPluginRegistry::new()),
            instances: Arc::new(InstanceRegistry::new()),
        }
    }

    pub fn plugins(&self) -> Arc<TypedPluginRegistry<PluginRecord>> {
        Arc::clone(&self.plugins)
    }

    pub fn instances(&self) -> Arc<InstanceRegistry<I>> {
        Arc::clone(&self.instances)
    }

    fn optional_symbol(
        &self,
        boundary: &dyn IsolationBoundary,
        plugin: &Plugin,
        property: &str,
    ) -> Option<String> {
        let name = plugin.manifest.properties.get(property)?;
        match boundary.load_symbol(name) {
            Ok(symbol) => Some(symbol.name),
            Err(e) => {
                warn!(plugin = %plugin.key(), property, error = %e, "unable to resolve plugin symbol");
                None
            }
        }
    }

    fn register(&self, boundary: &dyn IsolationBoundary, plugin: &Plugin) {
        let record = PluginRecord {
            plugin: plugin.clone(),
            configuration_type: self.optional_symbol(boundary, plugin, CONFIGURATION_PROPERTY),
            mapper_type: self.optional_symbol(boundary, plugin, MAPPER_PROPERTY),
        };
        if !self.plugins.register(record) {
            return;
        }

        match self.constructors.build(boundary, plugin, &Settings::new()) {
            Ok(instance) => {
                self.instances.insert(&plugin.id, plugin.deployed, instance);
                info!(plugin = %plugin.key(), deployed = plugin.deployed, "plugin registered");
            }
            Err(e) => {
                warn!(
                    plugin = %plugin.key(),
                    error = %e,
                    "plugin registered without an instance"
                );
            }
        }
    }
}

#[async_trait]
impl<I: ?Sized + Send + Sync + 'static> DeploymentHandler for CategoryHandler<I> {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, plugin: &Plugin) -> bool {
        plugin.plugin_type == self.plugin_type
    }

    fn accepts_undeployed(&self) -> bool {
        true
    }

    async fn handle(&self, plugin: &Plugin) -> Result<(), PorticoError> {
        let Some(boundary) = self
            .boundaries
            .get_or_create(plugin, Arc::clone(&self.host))
        else {
            warn!(plugin = %plugin.key(), "no isolation boundary, skipping plugin");
            return Ok(());
        };
        debug!(plugin = %plugin.key(), handler = %self.name, "registering plugin");
        self.register(boundary.as_ref(), plugin);
        self.boundaries.finish(plugin, &boundary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{CachingBoundaryFactory, DefaultBoundaryFactory, HostBoundary};
    use crate::loader::ArchiveLoader;
    use portico_test_utils::PluginArchiveBuilder;

    trait Policy: Send + Sync {
        fn describe(&self) -> String;
    }

    struct Cors {
        origin: String,
    }

    impl Policy for Cors {
        fn describe(&self) -> String {
            format!("cors from {}", self.origin)
        }
    }

    fn constructors() -> Arc<ConstructorRegistry<dyn Policy>> {
        let registry: ConstructorRegistry<dyn Policy> = ConstructorRegistry::new();
        registry.register("io.portico.policy.Cors", |ctx| {
            Ok(Arc::new(Cors {
                origin: ctx.symbol.name.clone(),
            }) as Arc<dyn Policy>)
        });
        Arc::new(registry)
    }

    fn load(builder: PluginArchiveBuilder) -> (tempfile::TempDir, Plugin) {
        let dir = tempfile::tempdir().unwrap();
        let archive = builder.write_to(dir.path()).unwrap();
        let plugin = ArchiveLoader::new(dir.path(), None).try_load(&archive).unwrap();
        (dir, plugin)
    }

    #[tokio::test]
    async fn builds_instance_and_resolves_optional_symbols() {
        let (_dir, plugin) = load(
            PluginArchiveBuilder::new("cors", "policy")
                .class_name("io.portico.policy.Cors")
                .property(CONFIGURATION_PROPERTY, "io.portico.policy.CorsConfiguration")
                .symbol("io.portico.policy.CorsConfiguration"),
        );
        let handler = CategoryHandler::new(
            "policy",
            Arc::new(HostBoundary::new()),
            Arc::new(DefaultBoundaryFactory),
            constructors(),
        );

        handler.handle(&plugin).await.unwrap();

        let record = handler.plugins().get("cors").unwrap();
        assert_eq!(
            record.configuration_type.as_deref(),
            Some("io.portico.policy.CorsConfiguration")
        );
        assert_eq!(record.mapper_type, None);
        let instance = handler.instances().get("cors").unwrap();
        assert_eq!(instance.describe(), "cors from io.portico.policy.Cors");
    }

    #[tokio::test]
    async fn missing_constructor_still_registers_plugin() {
        let (_dir, plugin) = load(
            PluginArchiveBuilder::new("jwt", "policy").class_name("io.portico.policy.Jwt"),
        );
        let handler = CategoryHandler::new(
            "policy",
            Arc::new(HostBoundary::new()),
            Arc::new(DefaultBoundaryFactory),
            constructors(),
        );

        handler.handle(&plugin).await.unwrap();

        assert!(handler.plugins().get("jwt").is_some());
        assert!(!handler.instances().contains("jwt"));
    }

    #[tokio::test]
    async fn undeployed_plugin_lands_in_its_own_bucket() {
        let (_dir, mut plugin) = load(
            PluginArchiveBuilder::new("cors", "policy").class_name("io.portico.policy.Cors"),
        );
        plugin.deployed = false;
        let handler = CategoryHandler::new(
            "policy",
            Arc::new(HostBoundary::new()),
            Arc::new(DefaultBoundaryFactory),
            constructors(),
        );

        assert!(handler.accepts_undeployed());
        handler.handle(&plugin).await.unwrap();

        assert!(handler.instances().get("cors").is_none());
        assert!(handler.instances().get_undeployed("cors").is_some());
        assert!(handler.plugins().get("cors").is_none());
        assert!(handler.plugins().get_including("cors", true).is_some());
    }

    #[tokio::test]
    async fn caching_factory_keeps_boundary_open() {
        let (_dir, plugin) = load(
            PluginArchiveBuilder::new("cors", "policy").class_name("io.portico.policy.Cors"),
        );
        let factory = Arc::new(CachingBoundaryFactory::new());
        let handler = CategoryHandler::new(
            "policy",
            Arc::new(HostBoundary::new()),
            Arc::clone(&factory) as Arc<dyn BoundaryFactory>,
            constructors(),
        );

        handler.handle(&plugin).await.unwrap();

        let cached = factory.cached("cors").unwrap();
        assert!(cached.load_symbol("io.portico.policy.Cors").is_ok());
        factory.evict("cors");
        assert!(cached.load_symbol("io.portico.policy.Cors").is_err());
    }

    #[tokio::test]
    async fn unreadable_classpath_skips_plugin() {
        let (_dir, mut plugin) = load(
            PluginArchiveBuilder::new("cors", "policy").class_name("io.portico.policy.Cors"),
        );
        plugin.classpath.push("/nowhere/missing.jar".into());
        let handler = CategoryHandler::new(
            "policy",
            Arc::new(HostBoundary::new()),
            Arc::new(DefaultBoundaryFactory),
            constructors(),
        );

        handler.handle(&plugin).await.unwrap();
        assert!(handler.plugins().is_empty());
    }

    #[tokio::test]
    async fn other_types_are_not_handled() {
        let (_dir, plugin) = load(PluginArchiveBuilder::new("redis", "cache"));
        let handler: CategoryHandler<dyn Policy> = CategoryHandler::new(
            "policy",
            Arc::new(HostBoundary::new()),
            Arc::new(DefaultBoundaryFactory),
            constructors(),
        );
        assert_eq!(handler.name(), "policy-handler");
        assert!(!handler.can_handle(&plugin));
    }
}
