// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam traits between the deployment pipeline and its collaborators.

pub mod boundary;
pub mod handler;
pub mod sleeper;

pub use boundary::{IsolationBoundary, SymbolHandle, SymbolOrigin};
pub use handler::DeploymentHandler;
pub use sleeper::{Sleeper, TokioSleeper};
