// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error type for the persistence layer.

use thiserror::Error;

/// Result type using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures surfaced by the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested row does not exist.
    #[error("{entity} '{key}' not found")]
    NotFound {
        entity: &'static str,
        key: String,
    },

    /// A persisted timestamp could not be parsed back.
    #[error("unreadable timestamp {value:?} in column '{column}'")]
    Timestamp { column: &'static str, value: String },

    /// A persisted enum tag could not be parsed back.
    #[error("unreadable value {value:?} in column '{column}'")]
    Tag { column: &'static str, value: String },

    /// Unknown `DATABASE_TYPE` tag.
    #[error("unsupported database type {0:?}, expected POSTGRES, MYSQL or SQLITE")]
    UnknownDialect(String),

    /// The backend reported no generated key for an insert.
    #[error("insert into {0} returned no generated id")]
    MissingInsertId(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Whether the underlying database rejected the write for violating a
    /// unique index. Used to treat duplicate `external_id` inserts as
    /// idempotent at the call site.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Sqlx(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}
