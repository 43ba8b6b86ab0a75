// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository-scope binder.
//!
//! Each scope moves `Unbound -> Binding -> Bound` at most once: the first
//! repository plugin whose store type matches the scope's configured type
//! binds it. A failed bind is retried every `retry_delay_ms`, forever unless
//! `max_attempts` is set.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use portico_config::PorticoConfig;
use portico_core::{
    DeploymentHandler, IsolationBoundary, KnownPluginType, Plugin, PluginKey, PorticoError,
    Sleeper, TokioSleeper,
};
use portico_plugin::{BoundaryFactory, ConstructorRegistry};
use tracing::{debug, error, info, warn};

use crate::scope::{Repository, Scope, ScopeContext, ScopeInstance, ScopeState};

#[derive(Default)]
struct ScopeSlot {
    state: ScopeState,
    bound_by: Option<PluginKey>,
    instance: Option<ScopeInstance>,
}

/// Deployment handler binding repository plugins to scopes.
pub struct RepositoryBinder {
    config: Arc<PorticoConfig>,
    host: Arc<dyn IsolationBoundary>,
    boundaries: Arc<dyn BoundaryFactory>,
    constructors: Arc<ConstructorRegistry<dyn Repository>>,
    sleeper: Arc<dyn Sleeper>,
    slots: Mutex<HashMap<Scope, ScopeSlot>>,
}

impl RepositoryBinder {
    /// Binder for `required` scopes.
    ///
    /// Fails with [`PorticoError::Config`] if any required scope has no
    /// configured backing-store type.
    pub fn new(
        config: Arc<PorticoConfig>,
        required: &[Scope],
        host: Arc<dyn IsolationBoundary>,
        boundaries: Arc<dyn BoundaryFactory>,
        constructors: Arc<ConstructorRegistry<dyn Repository>>,
    ) -> Result<Self, PorticoError> {
        let missing: Vec<&str> = required
            .iter()
            .filter(|scope| config.repository_type(scope.as_ref()).is_none())
            .map(|scope| scope.as_ref())
            .collect();
        if !missing.is_empty() {
            return Err(PorticoError::Config(format!(
                "no repository type configured for scope(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            config,
            host,
            boundaries,
            constructors,
            sleeper: Arc::new(TokioSleeper),
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Replaces the sleeper used between bind attempts.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self, scope: Scope) -> ScopeState {
        self.slots
            .lock()
            .get(&scope)
            .map(|slot| slot.state)
            .unwrap_or_default()
    }

    /// Instance bound to `scope`, if any.
    pub fn instance(&self, scope: Scope) -> Option<ScopeInstance> {
        self.slots
            .lock()
            .get(&scope)
            .and_then(|slot| slot.instance.clone())
    }

    /// Instance bound to `scope`, downcast to `T`.
    pub fn instance_as<T: Send + Sync + 'static>(&self, scope: Scope) -> Option<Arc<T>> {
        self.instance(scope)?.downcast::<T>().ok()
    }

    /// Plugin that bound `scope`.
    pub fn bound_by(&self, scope: Scope) -> Option<PluginKey> {
        self.slots
            .lock()
            .get(&scope)
            .and_then(|slot| slot.bound_by.clone())
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.config.repository_binding.retry_delay_ms)
    }

    /// Moves `scope` to `Binding` unless another plugin holds it.
    fn claim(&self, scope: Scope, plugin: &Plugin) -> bool {
        let mut slots = self.slots.lock();
        let slot = slots.entry(scope).or_default();
        match slot.state {
            ScopeState::Unbound => {
                slot.state = ScopeState::Binding;
                true
            }
            ScopeState::Binding | ScopeState::Bound => {
                warn!(
                    scope = %scope,
                    plugin = %plugin.key(),
                    bound_by = ?slot.bound_by,
                    "scope already bound, skipping"
                );
                false
            }
        }
    }

    fn settle(&self, scope: Scope, outcome: Option<(PluginKey, ScopeInstance)>) {
        let mut slots = self.slots.lock();
        let slot = slots.entry(scope).or_default();
        match outcome {
            Some((key, instance)) => {
                slot.state = ScopeState::Bound;
                slot.bound_by = Some(key);
                slot.instance = Some(instance);
            }
            None => slot.state = ScopeState::Unbound,
        }
    }

    /// Binds `scope`, retrying until success or until `max_attempts` is reached.
    async fn bind_scope(
        &self,
        repository: &dyn Repository,
        plugin: &Plugin,
        context: ScopeContext,
    ) -> Result<(), PorticoError> {
        let scope = context.scope;
        let max_attempts = self.config.repository_binding.max_attempts;
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match repository.bind(&context).await {
                Ok(instance) => {
                    info!(scope = %scope, plugin = %plugin.key(), attempt, "repository scope bound");
                    self.settle(scope, Some((plugin.key(), instance)));
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        scope = %scope,
                        plugin = %plugin.key(),
                        attempt,
                        error = %e,
                        "unable to bind repository scope"
                    );
                    if max_attempts > 0 && attempt >= max_attempts {
                        self.settle(scope, None);
                        return Err(PorticoError::Handler {
                            handler: self.name().to_string(),
                            plugin: plugin.key(),
                            message: format!(
                                "scope {scope} not bound after {attempt} attempt(s): {e}"
                            ),
                        });
                    }
                    self.sleeper.sleep(self.retry_delay()).await;
                }
            }
        }
    }
}

#[async_trait]
impl DeploymentHandler for RepositoryBinder {
    fn name(&self) -> &str {
        "repository-binder"
    }

    fn can_handle(&self, plugin: &Plugin) -> bool {
        plugin.plugin_type == KnownPluginType::Repository.as_ref()
    }

    async fn handle(&self, plugin: &Plugin) -> Result<(), PorticoError> {
        let Some(boundary) = self
            .boundaries
            .get_or_create(plugin, Arc::clone(&self.host))
        else {
            warn!(plugin = %plugin.key(), "no isolation boundary, skipping repository");
            return Ok(());
        };
        let built = self
            .constructors
            .build(boundary.as_ref(), plugin, &Default::default());
        self.boundaries.finish(plugin, &boundary);
        let repository = built?;

        let mut failure = None;
        for scope in repository.scopes() {
            let configured = self.config.repository_type(scope.as_ref());
            if configured != Some(repository.store_type()) {
                debug!(
                    scope = %scope,
                    plugin = %plugin.key(),
                    configured = ?configured,
                    "repository type does not match scope configuration"
                );
                continue;
            }
            if !self.claim(scope, plugin) {
                continue;
            }

            let context = ScopeContext {
                scope,
                store_type: repository.store_type().to_string(),
                settings: self
                    .config
                    .repositories
                    .get(scope.as_ref())
                    .map(|r| r.settings.clone())
                    .unwrap_or_default(),
            };
            if let Err(e) = self.bind_scope(repository.as_ref(), plugin, context).await {
                failure.get_or_insert(e);
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
