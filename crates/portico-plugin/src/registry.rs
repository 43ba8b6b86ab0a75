// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery orchestrator.
//!
//! [`PluginRegistry::start`] lists every configured plugin root, extracts the
//! packages on a bounded pool of blocking workers, and publishes a
//! [`DiscoveryEvent::Discovered`] per new plugin followed by a single
//! [`DiscoveryEvent::Ended`] once every extraction has finished.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use portico_config::PorticoConfig;
use portico_core::{Plugin, PluginKey, PorticoError};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::loader::ArchiveLoader;

/// Events published to discovery subscribers.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A plugin was extracted and accepted into the inventory.
    Discovered(Plugin),
    /// Every extraction task has completed.
    Ended,
}

#[derive(Default)]
struct Inventory {
    order: Vec<PluginKey>,
    plugins: HashMap<PluginKey, Plugin>,
    duplicates: Vec<PluginKey>,
}

/// Shared state written by extraction workers.
struct Shared {
    config: Arc<PorticoConfig>,
    subscribers: Vec<mpsc::UnboundedSender<DiscoveryEvent>>,
    inventory: Mutex<Inventory>,
}

impl Shared {
    fn publish(&self, event: DiscoveryEvent) {
        for subscriber in &self.subscribers {
            if subscriber.send(event.clone()).is_err() {
                debug!("discovery subscriber dropped its receiver");
            }
        }
    }

    /// First registration of a key wins; later ones are recorded as duplicates.
    fn accept(&self, mut plugin: Plugin) {
        plugin.deployed = self
            .config
            .is_plugin_enabled(&plugin.plugin_type, &plugin.id);
        let key = plugin.key();

        {
            let mut inventory = self.inventory.lock();
            if inventory.plugins.contains_key(&key) {
                if self.config.plugins.fail_on_duplicate {
                    error!(plugin = %key, path = %plugin.path.display(), "duplicate plugin");
                } else {
                    warn!(
                        plugin = %key,
                        path = %plugin.path.display(),
                        "duplicate plugin ignored, keeping the first one discovered"
                    );
                }
                inventory.duplicates.push(key);
                return;
            }
            inventory.order.push(key.clone());
            inventory.plugins.insert(key.clone(), plugin.clone());
        }

        if !plugin.deployed {
            info!(plugin = %key, "plugin disabled by configuration");
        }
        self.publish(DiscoveryEvent::Discovered(plugin));
    }
}

/// Discovers plugin packages and holds the resulting inventory.
pub struct PluginRegistry {
    shared: Arc<Shared>,
    initialized: AtomicBool,
}

impl PluginRegistry {
    /// Registry publishing discovery events to `subscribers`.
    pub fn new(
        config: Arc<PorticoConfig>,
        subscribers: Vec<mpsc::UnboundedSender<DiscoveryEvent>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                subscribers,
                inventory: Mutex::new(Inventory::default()),
            }),
            initialized: AtomicBool::new(false),
        }
    }

    /// Runs discovery once. A second call after success is a no-op.
    ///
    /// Missing or unreadable plugin roots and (when configured) duplicate
    /// plugin keys abort the start; a broken package only drops that plugin.
    pub async fn start(&self) -> Result<(), PorticoError> {
        if self.initialized.load(Ordering::Acquire) {
            warn!("plugin registry already started");
            return Ok(());
        }

        let config = &self.shared.config.plugins;
        if config.paths.is_empty() {
            return Err(PorticoError::Config(
                "no plugin root configured (plugins.paths)".to_string(),
            ));
        }

        let mut jobs: Vec<(Arc<ArchiveLoader>, PathBuf)> = Vec::new();
        for (index, root) in config.paths.iter().enumerate() {
            let archives = ArchiveLoader::list_archives(root)?;
            info!(root = %root.display(), archives = archives.len(), "scanning plugin root");
            let loader = Arc::new(ArchiveLoader::for_root(
                index,
                root,
                config.work_dir.as_deref(),
            ));
            jobs.extend(archives.into_iter().map(|a| (Arc::clone(&loader), a)));
        }

        let workers = config.worker_count();
        debug!(workers, packages = jobs.len(), "starting extraction");
        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for (loader, archive) in jobs {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| PorticoError::Internal(format!("worker pool closed: {e}")))?;
            let shared = Arc::clone(&self.shared);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                if let Some(plugin) = loader.load(&archive) {
                    shared.accept(plugin);
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "plugin extraction task failed");
            }
        }

        if config.fail_on_duplicate {
            let inventory = self.shared.inventory.lock();
            if let Some(key) = inventory.duplicates.first() {
                return Err(PorticoError::DuplicatePlugin { key: key.clone() });
            }
        }

        self.initialized.store(true, Ordering::Release);
        info!(plugins = self.len(), "plugin discovery finished");
        self.shared.publish(DiscoveryEvent::Ended);
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Every accepted plugin, in discovery order.
    pub fn plugins(&self) -> Vec<Plugin> {
        let inventory = self.shared.inventory.lock();
        inventory
            .order
            .iter()
            .filter_map(|key| inventory.plugins.get(key).cloned())
            .collect()
    }

    pub fn get(&self, key: &PluginKey) -> Option<Plugin> {
        self.shared.inventory.lock().plugins.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.inventory.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
