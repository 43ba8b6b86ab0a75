// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository scopes and the contract repository plugins implement.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use portico_config::model::Settings;
use portico_core::PorticoError;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A logical storage domain backed by exactly one repository plugin.
///
/// The string form is the key under `[repositories]` in the configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr,
    EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Scope {
    Management,
    RateLimit,
    Analytics,
    KeyValue,
    DistributedSync,
}

/// Binding progress of one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeState {
    #[default]
    Unbound,
    Binding,
    Bound,
}

/// The configuration narrowed to one scope, handed to [`Repository::bind`].
#[derive(Debug, Clone)]
pub struct ScopeContext {
    pub scope: Scope,
    /// Configured backing-store type for the scope.
    pub store_type: String,
    pub settings: Settings,
}

/// Instance produced by binding a scope.
pub type ScopeInstance = Arc<dyn Any + Send + Sync>;

/// Implemented by repository plugin instances.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Backing-store type this repository provides (e.g. "mongodb").
    fn store_type(&self) -> &str;

    /// Scopes this repository can serve.
    fn scopes(&self) -> Vec<Scope>;

    /// Creates the scope's instance. Errors are retried by the binder.
    async fn bind(&self, context: &ScopeContext) -> Result<ScopeInstance, PorticoError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn scope_names_match_config_keys() {
        assert_eq!(Scope::RateLimit.as_ref(), "rate_limit");
        assert_eq!(Scope::from_str("distributed_sync").unwrap(), Scope::DistributedSync);
        assert!(Scope::from_str("ratelimit").is_err());
    }

    #[test]
    fn scopes_start_unbound() {
        assert_eq!(ScopeState::default(), ScopeState::Unbound);
    }
}
