// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Datasource specialization: one instance per `[[datasources]]` declaration.

use std::sync::Arc;

use async_trait::async_trait;
use portico_config::model::DatasourceConfig;
use portico_core::{DeploymentHandler, IsolationBoundary, KnownPluginType, Plugin, PorticoError};
use tracing::{debug, info, warn};

use crate::boundary::BoundaryFactory;
use crate::instance::{ConstructorRegistry, InstanceRegistry};

/// Builds the declared datasource instances of each datasource plugin.
///
/// Instances are stored under the declaration id. Disabled declarations are
/// ignored.
pub struct DatasourceHandler<I: ?Sized> {
    declarations: Vec<DatasourceConfig>,
    host: Arc<dyn IsolationBoundary>,
    boundaries: Arc<dyn BoundaryFactory>,
    constructors: Arc<ConstructorRegistry<I>>,
    instances: Arc<InstanceRegistry<I>>,
}

impl<I: ?Sized + Send + Sync + 'static> DatasourceHandler<I> {
    pub fn new(
        declarations: Vec<DatasourceConfig>,
        host: Arc<dyn IsolationBoundary>,
        boundaries: Arc<dyn BoundaryFactory>,
        constructors: Arc<ConstructorRegistry<I>>,
    ) -> Self {
        Self {
            declarations,
            host,
            boundaries,
            constructors,
            instances: Arc::new(InstanceRegistry::new()),
        }
    }

    pub fn instances(&self) -> Arc<InstanceRegistry<I>> {
        Arc::clone(&self.instances)
    }

    fn declarations_for<'a>(
        &'a self,
        plugin: &'a Plugin,
    ) -> impl Iterator<Item = &'a DatasourceConfig> {
        self.declarations
            .iter()
            .filter(move |d| d.enabled && d.id == plugin.id)
    }
}

#[async_trait]
impl<I: ?Sized + Send + Sync + 'static> DeploymentHandler for DatasourceHandler<I> {
    fn name(&self) -> &str {
        "datasource-handler"
    }

    fn can_handle(&self, plugin: &Plugin) -> bool {
        plugin.plugin_type == KnownPluginType::Datasource.as_ref()
    }

    async fn handle(&self, plugin: &Plugin) -> Result<(), PorticoError> {
        let declarations: Vec<&DatasourceConfig> = self.declarations_for(plugin).collect();
        if declarations.is_empty() {
            debug!(plugin = %plugin.key(), "no enabled datasource declared for plugin");
            return Ok(());
        }

        let Some(boundary) = self
            .boundaries
            .get_or_create(plugin, Arc::clone(&self.host))
        else {
            warn!(plugin = %plugin.key(), "no isolation boundary, skipping datasource");
            return Ok(());
        };

        let mut failure = None;
        for declaration in declarations {
            match self
                .constructors
                .build(boundary.as_ref(), plugin, &declaration.settings)
            {
                Ok(instance) => {
                    self.instances.insert(&declaration.id, true, instance);
                    info!(datasource = %declaration.id, "datasource instance created");
                }
                Err(e) => {
                    warn!(datasource = %declaration.id, error = %e, "unable to create datasource");
                    failure.get_or_insert(e);
                }
            }
        }
        self.boundaries.finish(plugin, &boundary);

        match failure {
            Some(e) => Err(PorticoError::Handler {
                handler: self.name().to_string(),
                plugin: plugin.key(),
                message: e.to_string(),
            }),
            None => Ok(()),
        }
    }
}
