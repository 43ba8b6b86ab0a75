// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `portico deploy` command implementation.
//!
//! Builds the handler chain (class inspection, repository binding,
//! datasources, one category handler per remaining plugin type), discovers
//! plugins, then runs the deployment walk.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use portico_config::PorticoConfig;
use portico_core::{
    DeploymentHandler, IsolationBoundary, KnownPluginType, Plugin, PorticoError, SymbolOrigin,
};
use portico_plugin::{
    BoundaryFactory, CategoryHandler, ConstructorRegistry, DatasourceHandler,
    DefaultBoundaryFactory, HostBoundary, PluginDeployer, PluginRegistry,
};
use portico_repository::{RepositoryBinder, Scope};
use strum::IntoEnumIterator;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Scopes the gateway cannot run without.
pub const REQUIRED_SCOPES: &[Scope] = &[Scope::Management, Scope::RateLimit];

/// Instance type of category and datasource plugins built by the runtime.
type PluginInstance = dyn Any + Send + Sync;

/// Checks that every deployed plugin's class resolves inside its classpath.
pub struct InspectHandler {
    host: Arc<dyn IsolationBoundary>,
    boundaries: Arc<dyn BoundaryFactory>,
}

impl InspectHandler {
    pub fn new() -> Self {
        Self {
            host: Arc::new(HostBoundary::new()),
            boundaries: Arc::new(DefaultBoundaryFactory),
        }
    }
}

impl Default for InspectHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeploymentHandler for InspectHandler {
    fn name(&self) -> &str {
        "inspect"
    }

    fn can_handle(&self, _plugin: &Plugin) -> bool {
        true
    }

    async fn handle(&self, plugin: &Plugin) -> Result<(), PorticoError> {
        let boundary = self
            .boundaries
            .get_or_create(plugin, Arc::clone(&self.host))
            .ok_or_else(|| PorticoError::Handler {
                handler: self.name().to_string(),
                plugin: plugin.key(),
                message: "no isolation boundary".to_string(),
            })?;
        let resolved = boundary.load_symbol(&plugin.class_name);
        self.boundaries.finish(plugin, &boundary);

        let symbol = resolved?;
        let origin = match &symbol.origin {
            SymbolOrigin::Host => "host".to_string(),
            SymbolOrigin::Archive(path) => path.display().to_string(),
        };
        info!(plugin = %plugin.key(), class = %symbol.name, origin = %origin, "plugin class resolved");
        Ok(())
    }
}

/// The deployer with every runtime handler registered.
///
/// Fails with [`PorticoError::Config`] when a required repository scope has
/// no configured store type.
pub fn build_deployer(config: &Arc<PorticoConfig>) -> Result<PluginDeployer, PorticoError> {
    let host: Arc<dyn IsolationBoundary> = Arc::new(HostBoundary::new());
    let boundaries: Arc<dyn BoundaryFactory> = Arc::new(DefaultBoundaryFactory);

    let binder = RepositoryBinder::new(
        Arc::clone(config),
        REQUIRED_SCOPES,
        Arc::clone(&host),
        Arc::clone(&boundaries),
        Arc::new(ConstructorRegistry::new()),
    )?;
    let datasources = DatasourceHandler::<PluginInstance>::new(
        config.datasources.clone(),
        Arc::clone(&host),
        Arc::clone(&boundaries),
        Arc::new(ConstructorRegistry::new()),
    );

    let mut deployer = PluginDeployer::new(config.plugins.secret_provider_load_first.clone())
        .with_handler(Arc::new(InspectHandler::new()))
        .with_handler(Arc::new(binder))
        .with_handler(Arc::new(datasources));
    for plugin_type in KnownPluginType::iter().filter(|t| {
        !matches!(t, KnownPluginType::Repository | KnownPluginType::Datasource)
    }) {
        debug!(plugin_type = %plugin_type, "registering category handler");
        deployer = deployer.with_handler(Arc::new(CategoryHandler::<PluginInstance>::new(
            plugin_type.as_ref(),
            Arc::clone(&host),
            Arc::clone(&boundaries),
            Arc::new(ConstructorRegistry::new()),
        )));
    }
    Ok(deployer)
}

/// Run the `portico deploy` command.
pub async fn run_deploy(config: PorticoConfig) -> Result<(), PorticoError> {
    let config = Arc::new(config);
    let deployer = build_deployer(&config)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let registry = PluginRegistry::new(Arc::clone(&config), vec![tx]);
    registry.start().await?;
    let report = deployer.run(rx).await?;

    for (position, key) in report.order.iter().enumerate() {
        let failure = report.failed.iter().find(|(k, _)| k == key);
        match failure {
            Some((_, message)) => println!("{:>3}. {key}  FAILED: {message}", position + 1),
            None => println!("{:>3}. {key}", position + 1),
        }
    }
    println!(
        "{} plugin(s) walked, {} failed",
        report.order.len(),
        report.failed.len()
    );
    Ok(())
}
