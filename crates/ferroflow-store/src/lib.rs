// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Relational persistence for FerroFlow.
//!
//! One store implementation serves PostgreSQL, MySQL and SQLite: statements
//! are assembled at runtime against the [`dialect::Dialect`] of the
//! configured backend and executed through sqlx's `Any` driver. All atomic
//! instance transitions the engine relies on live in
//! [`workflows::WorkflowStore`].

pub mod actions;
pub mod definitions;
pub mod dialect;
pub mod error;
pub mod executors;
pub mod schema;
pub mod workflows;

pub use actions::{ActionStore, NewAction};
pub use definitions::DefinitionStore;
pub use dialect::Dialect;
pub use error::{Result, StoreError};
pub use executors::ExecutorStore;
pub use workflows::{DefinitionStateRow, WorkflowOverviewRow, WorkflowStore};

use std::sync::Once;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

static INSTALL_DRIVERS: Once = Once::new();

/// Connect an `Any` pool to the given database URL.
///
/// URL schemes: `postgres://…`, `mysql://…`, `sqlite:…`. Driver
/// registration happens once per process.
pub async fn connect(database_url: &str) -> Result<AnyPool> {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}
