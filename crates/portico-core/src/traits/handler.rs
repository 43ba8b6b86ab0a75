// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deployment handler contract used by the scheduler's dispatch walk.

use async_trait::async_trait;

use crate::error::PorticoError;
use crate::types::Plugin;

/// Something that knows how to instantiate a family of plugins.
///
/// Every handler whose [`can_handle`](DeploymentHandler::can_handle) matches a
/// plugin is invoked, in registration order.
#[async_trait]
pub trait DeploymentHandler: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    fn can_handle(&self, plugin: &Plugin) -> bool;

    /// Whether plugins disabled by configuration are still dispatched here.
    fn accepts_undeployed(&self) -> bool {
        false
    }

    async fn handle(&self, plugin: &Plugin) -> Result<(), PorticoError>;
}
