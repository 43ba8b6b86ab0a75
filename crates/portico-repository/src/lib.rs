// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository-scope binding for Portico.
//!
//! Repository plugins provide backing stores for logical scopes
//! ([`Scope`]). The [`RepositoryBinder`] is a deployment handler that binds
//! each configured scope to the first matching repository plugin.

pub mod binder;
pub mod scope;

pub use binder::RepositoryBinder;
pub use scope::{Repository, Scope, ScopeContext, ScopeInstance, ScopeState};
