// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording doubles for deployment handlers and retry delays.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use portico_core::{DeploymentHandler, Plugin, PluginKey, PorticoError, Sleeper};

/// Shared, ordered record of `(handler, plugin)` dispatches.
#[derive(Debug, Clone, Default)]
pub struct DispatchLog {
    entries: Arc<Mutex<Vec<(String, PluginKey)>>>,
}

impl DispatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, handler: &str, key: PluginKey) {
        self.entries.lock().push((handler.to_string(), key));
    }

    pub fn entries(&self) -> Vec<(String, PluginKey)> {
        self.entries.lock().clone()
    }

    /// Plugin ids in dispatch order, across handlers.
    pub fn ids(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(_, k)| k.id.clone()).collect()
    }

    /// Plugin ids dispatched to `handler`, in order.
    pub fn ids_for(&self, handler: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(h, _)| h == handler)
            .map(|(_, k)| k.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A deployment handler that records every plugin it is given.
///
/// Handles every plugin unless restricted with [`only_types`](Self::only_types).
/// Plugins listed with [`failing_on`](Self::failing_on) are recorded and
/// then rejected with [`PorticoError::Handler`].
pub struct RecordingHandler {
    name: String,
    types: Option<HashSet<String>>,
    failing: HashSet<String>,
    accepts_undeployed: bool,
    log: DispatchLog,
}

impl RecordingHandler {
    pub fn new(name: impl Into<String>, log: DispatchLog) -> Self {
        Self {
            name: name.into(),
            types: None,
            failing: HashSet::new(),
            accepts_undeployed: false,
            log,
        }
    }

    pub fn only_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn failing_on(mut self, id: impl Into<String>) -> Self {
        self.failing.insert(id.into());
        self
    }

    pub fn accepting_undeployed(mut self) -> Self {
        self.accepts_undeployed = true;
        self
    }
}

#[async_trait]
impl DeploymentHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, plugin: &Plugin) -> bool {
        self.types
            .as_ref()
            .is_none_or(|types| types.contains(&plugin.plugin_type))
    }

    fn accepts_undeployed(&self) -> bool {
        self.accepts_undeployed
    }

    async fn handle(&self, plugin: &Plugin) -> Result<(), PorticoError> {
        self.log.record(&self.name, plugin.key());
        if self.failing.contains(&plugin.id) {
            tracing::warn!(handler = %self.name, plugin = %plugin.key(), "simulated handler failure");
            return Err(PorticoError::Handler {
                handler: self.name.clone(),
                plugin: plugin.key(),
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

/// A sleeper that returns immediately and remembers each requested delay.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}
