// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin pipeline for Portico.
//!
//! Discovery ([`PluginRegistry`]) extracts plugin packages from the configured
//! roots and publishes what it finds; the [`PluginDeployer`] orders the
//! inventory by priority, category and dependencies, then hands each plugin
//! to the registered [`DeploymentHandler`](portico_core::DeploymentHandler)s.
//! Category handlers load plugin symbols through isolation boundaries and
//! keep the results in typed registries.

pub mod boundary;
pub mod datasource;
pub mod instance;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod scheduler;
pub mod typed;

pub use boundary::{
    ArchiveBoundary, BoundaryFactory, CachingBoundaryFactory, DefaultBoundaryFactory,
    HostBoundary,
};
pub use datasource::DatasourceHandler;
pub use instance::{
    CategoryHandler, Constructor, ConstructorRegistry, InstanceRegistry, PluginContext,
};
pub use loader::ArchiveLoader;
pub use manifest::{parse_plugin_manifest, parse_properties, MANIFEST_FILE_NAME};
pub use registry::{DiscoveryEvent, PluginRegistry};
pub use scheduler::{deployment_order, DeploymentReport, PluginDeployer, CATEGORY_PRIORITY};
pub use typed::{MoreInformation, PluginRecord, TypedPlugin, TypedPluginRegistry};
