// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error type for the engine and control-plane operations.

use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::RegistryError;
use ferroflow_store::StoreError;

/// Result type using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    /// No factory registered under this workflow type name.
    #[error("workflow type '{name}' is not registered")]
    UnknownWorkflowType { name: String },

    #[error("{what} '{key}' not found")]
    NotFound { what: &'static str, key: String },

    /// An optimistic lock could not be acquired; the row moved underneath
    /// the caller.
    #[error("unable to acquire lock; workflow busy")]
    Conflict,

    /// A create-and-wait deadline expired before the instance reached a
    /// requested state. The instance itself is unaffected.
    #[error("timeout waiting for workflow result")]
    WaitTimeout,

    #[error("{0}")]
    Validation(String),
}

impl EngineError {
    pub fn not_found(what: &'static str, key: impl ToString) -> Self {
        EngineError::NotFound {
            what,
            key: key.to_string(),
        }
    }
}
