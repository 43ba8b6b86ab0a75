// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Portico plugin runtime.
//!
//! Holds the plugin data model, the error type, and the traits the
//! deployment pipeline is written against: isolation boundaries,
//! deployment handlers, and the injectable retry delay.

pub mod error;
pub mod traits;
pub mod types;

pub use error::PorticoError;
pub use types::{
    DependencyEdge, KnownPluginType, Plugin, PluginKey, PluginManifest, DEFAULT_PRIORITY,
    WILDCARD_ID,
};

pub use traits::{
    DeploymentHandler, IsolationBoundary, Sleeper, SymbolHandle, SymbolOrigin, TokioSleeper,
};
