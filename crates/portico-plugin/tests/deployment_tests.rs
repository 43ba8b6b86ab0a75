// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: discovery, ordering and handler dispatch.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use portico_config::model::PluginOverride;
use portico_config::PorticoConfig;
use portico_core::{DeploymentHandler, PluginKey, PorticoError};
use portico_plugin::{
    CategoryHandler, ConstructorRegistry, DefaultBoundaryFactory, DeploymentReport,
    HostBoundary, PluginDeployer, PluginRegistry,
};
use portico_test_utils::{DispatchLog, PluginArchiveBuilder, RecordingHandler};
use tokio::sync::mpsc;

fn config_for(root: &Path) -> PorticoConfig {
    let mut config = PorticoConfig::default();
    config.plugins.paths = vec![root.to_path_buf()];
    config
}

fn disable(config: &mut PorticoConfig, plugin_type: &str, id: &str) {
    config
        .overrides
        .entry(plugin_type.to_string())
        .or_insert_with(HashMap::new)
        .insert(
            id.to_string(),
            PluginOverride {
                enabled: Some(false),
            },
        );
}

/// Discovers `config`'s roots and deploys through `deployer`.
async fn discover_and_deploy(
    config: PorticoConfig,
    deployer: &PluginDeployer,
) -> Result<DeploymentReport, PorticoError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let registry = PluginRegistry::new(Arc::new(config), vec![tx]);
    registry.start().await?;
    deployer.run(rx).await
}

#[tokio::test]
async fn dependencies_deploy_before_dependents() {
    let root = tempfile::tempdir().unwrap();
    PluginArchiveBuilder::new("a", "policy")
        .depends_on("policy:b")
        .write_to(root.path())
        .unwrap();
    PluginArchiveBuilder::new("b", "policy")
        .depends_on("policy:c")
        .write_to(root.path())
        .unwrap();
    PluginArchiveBuilder::new("c", "policy")
        .write_to(root.path())
        .unwrap();
    let log = DispatchLog::new();
    let deployer =
        PluginDeployer::new(None).with_handler(Arc::new(RecordingHandler::new("rec", log.clone())));

    discover_and_deploy(config_for(root.path()), &deployer)
        .await
        .unwrap();

    assert_eq!(log.ids(), vec!["c", "b", "a"]);
}

#[tokio::test]
async fn repository_deploys_before_same_priority_custom_type() {
    let root = tempfile::tempdir().unwrap();
    PluginArchiveBuilder::new("aaa-custom", "custom")
        .write_to(root.path())
        .unwrap();
    PluginArchiveBuilder::new("zzz-mongodb", "repository")
        .write_to(root.path())
        .unwrap();
    let log = DispatchLog::new();
    let deployer =
        PluginDeployer::new(None).with_handler(Arc::new(RecordingHandler::new("rec", log.clone())));

    discover_and_deploy(config_for(root.path()), &deployer)
        .await
        .unwrap();

    assert_eq!(log.ids(), vec!["zzz-mongodb", "aaa-custom"]);
}

#[tokio::test]
async fn configured_secret_provider_loads_first() {
    let root = tempfile::tempdir().unwrap();
    for id in ["aws", "kubernetes", "vault"] {
        PluginArchiveBuilder::new(id, "secret-provider")
            .write_to(root.path())
            .unwrap();
    }
    let log = DispatchLog::new();
    let deployer = PluginDeployer::new(Some("vault".to_string()))
        .with_handler(Arc::new(RecordingHandler::new("rec", log.clone())));

    discover_and_deploy(config_for(root.path()), &deployer)
        .await
        .unwrap();

    assert_eq!(log.ids().first().map(String::as_str), Some("vault"));
    assert_eq!(log.len(), 3);
}

#[tokio::test]
async fn disabled_plugin_is_not_dispatched() {
    let root = tempfile::tempdir().unwrap();
    PluginArchiveBuilder::new("cors", "policy")
        .write_to(root.path())
        .unwrap();
    PluginArchiveBuilder::new("rate-limit", "policy")
        .write_to(root.path())
        .unwrap();
    let mut config = config_for(root.path());
    disable(&mut config, "policy", "rate-limit");
    let log = DispatchLog::new();
    let deployer = PluginDeployer::new(None)
        .with_handler(Arc::new(RecordingHandler::new("strict", log.clone())))
        .with_handler(Arc::new(
            RecordingHandler::new("inventory", log.clone()).accepting_undeployed(),
        ));

    let report = discover_and_deploy(config, &deployer).await.unwrap();

    assert_eq!(log.ids_for("strict"), vec!["cors"]);
    let mut all = log.ids_for("inventory");
    all.sort();
    assert_eq!(all, vec!["cors", "rate-limit"]);
    assert_eq!(report.order.len(), 2);
}

#[tokio::test]
async fn handler_failure_only_affects_that_plugin() {
    let root = tempfile::tempdir().unwrap();
    for (id, priority) in [("first", 1), ("broken", 2), ("last", 3)] {
        PluginArchiveBuilder::new(id, "policy")
            .priority(priority)
            .write_to(root.path())
            .unwrap();
    }
    let log = DispatchLog::new();
    let deployer = PluginDeployer::new(None)
        .with_handler(Arc::new(
            RecordingHandler::new("primary", log.clone()).failing_on("broken"),
        ))
        .with_handler(Arc::new(RecordingHandler::new("secondary", log.clone())));

    let report = discover_and_deploy(config_for(root.path()), &deployer)
        .await
        .unwrap();

    assert_eq!(log.ids_for("primary"), vec!["first", "broken", "last"]);
    assert_eq!(log.ids_for("secondary"), vec!["first", "last"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, PluginKey::new("broken", "policy"));
}

#[tokio::test]
async fn handlers_run_in_registration_order() {
    let root = tempfile::tempdir().unwrap();
    PluginArchiveBuilder::new("redis", "cache")
        .write_to(root.path())
        .unwrap();
    let log = DispatchLog::new();
    let deployer = PluginDeployer::new(None)
        .with_handler(Arc::new(RecordingHandler::new("one", log.clone())))
        .with_handler(Arc::new(
            RecordingHandler::new("policies-only", log.clone()).only_types(["policy"]),
        ))
        .with_handler(Arc::new(RecordingHandler::new("two", log.clone())));

    discover_and_deploy(config_for(root.path()), &deployer)
        .await
        .unwrap();

    let handlers: Vec<String> = log.entries().into_iter().map(|(h, _)| h).collect();
    assert_eq!(handlers, vec!["one", "two"]);
}

#[tokio::test]
async fn dependency_cycle_fails_before_any_dispatch() {
    let root = tempfile::tempdir().unwrap();
    PluginArchiveBuilder::new("a", "policy")
        .depends_on("policy:b")
        .write_to(root.path())
        .unwrap();
    PluginArchiveBuilder::new("b", "policy")
        .depends_on("policy:a")
        .write_to(root.path())
        .unwrap();
    PluginArchiveBuilder::new("standalone", "cache")
        .write_to(root.path())
        .unwrap();
    let log = DispatchLog::new();
    let deployer =
        PluginDeployer::new(None).with_handler(Arc::new(RecordingHandler::new("rec", log.clone())));

    let err = discover_and_deploy(config_for(root.path()), &deployer)
        .await
        .unwrap_err();

    assert!(matches!(err, PorticoError::DependencyCycle { .. }));
    assert!(log.is_empty());
}

#[tokio::test]
async fn run_without_end_of_discovery_is_an_error() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(tx);
    let deployer = PluginDeployer::new(None);
    assert!(matches!(
        deployer.run(rx).await,
        Err(PorticoError::Internal(_))
    ));
}

trait Policy: Send + Sync {}

struct Cors;

impl Policy for Cors {}

#[tokio::test]
async fn category_handler_exposes_workspace_resources() {
    let root = tempfile::tempdir().unwrap();
    PluginArchiveBuilder::new("cors", "policy")
        .class_name("io.portico.policy.Cors")
        .file("schemas/schema-form.json", r#"{"type":"object"}"#)
        .file("docs/README.md", "# CORS")
        .write_to(root.path())
        .unwrap();
    PluginArchiveBuilder::new("jwt", "policy")
        .file("schemas/a.json", "{}")
        .file("schemas/b.json", "{}")
        .write_to(root.path())
        .unwrap();
    let mut config = config_for(root.path());
    disable(&mut config, "policy", "jwt");

    let constructors: ConstructorRegistry<dyn Policy> = ConstructorRegistry::new();
    constructors.register("io.portico.policy.Cors", |_| Ok(Arc::new(Cors) as Arc<dyn Policy>));
    let policies = Arc::new(CategoryHandler::new(
        "policy",
        Arc::new(HostBoundary::new()),
        Arc::new(DefaultBoundaryFactory),
        Arc::new(constructors),
    ));
    let deployer =
        PluginDeployer::new(None).with_handler(Arc::clone(&policies) as Arc<dyn DeploymentHandler>);

    discover_and_deploy(config, &deployer).await.unwrap();

    let registry = policies.plugins();
    assert_eq!(registry.find_all().len(), 1);
    assert_eq!(registry.find_all_including(true).len(), 2);
    assert_eq!(
        registry.get_schema("cors").as_deref(),
        Some(r#"{"type":"object"}"#)
    );
    assert_eq!(
        registry.get_documentation("cors", false).as_deref(),
        Some("# CORS")
    );
    assert_eq!(registry.get_schema_in("jwt", None, true), None);
    assert!(policies.instances().get("cors").is_some());
    assert!(!policies.instances().contains("jwt"));
}
