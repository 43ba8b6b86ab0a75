// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Portico integration tests.
//!
//! Writes real plugin packages to temp directories and provides recording
//! doubles for the pipeline's seams.
//!
//! # Components
//!
//! - [`PluginArchiveBuilder`] - Builds a plugin package (module jar, lib jars, workspace files)
//! - [`RecordingHandler`] - Deployment handler that logs dispatch order into a [`DispatchLog`]
//! - [`RecordingSleeper`] - Sleeper that records requested delays without waiting

pub mod archive;
pub mod recording;

pub use archive::{write_corrupt_archive, write_ext_jar, PluginArchiveBuilder};
pub use recording::{DispatchLog, RecordingHandler, RecordingSleeper};
