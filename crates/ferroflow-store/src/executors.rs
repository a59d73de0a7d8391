// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Executor liveness rows.
//!
//! One row per engine process, written once at startup and heartbeated
//! afterwards. Rows are never deleted; the repair service only cares about
//! `last_active` recency.

use std::sync::Arc;

use sqlx::{AnyPool, Row};

use ferroflow_core::{Clock, ExecutorRecord};

use crate::dialect::Dialect;
use crate::error::{Result, StoreError};

/// Store for the `executors` table.
#[derive(Clone)]
pub struct ExecutorStore {
    pool: AnyPool,
    dialect: Dialect,
    clock: Arc<dyn Clock>,
}

impl ExecutorStore {
    pub fn new(pool: AnyPool, dialect: Dialect, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            dialect,
            clock,
        }
    }

    /// Register a new executor with `started = last_active = now`; returns
    /// the generated id.
    pub async fn save(&self, name: &str) -> Result<i64> {
        let d = self.dialect;
        let now = d.format_datetime(self.clock.now());
        let base = format!(
            "INSERT INTO executors (name, started, last_active) VALUES ({}, {}, {})",
            d.placeholder(1),
            d.placeholder(2),
            d.placeholder(3),
        );

        if d.supports_returning() {
            let sql = format!("{base} RETURNING id");
            let row = sqlx::query(&sql)
                .bind(name.to_string())
                .bind(now.clone())
                .bind(now)
                .fetch_one(&self.pool)
                .await?;
            Ok(row.try_get(0)?)
        } else {
            let result = sqlx::query(&base)
                .bind(name.to_string())
                .bind(now.clone())
                .bind(now)
                .execute(&self.pool)
                .await?;
            result
                .last_insert_id()
                .ok_or(StoreError::MissingInsertId("executors"))
        }
    }

    /// Heartbeat: refresh `last_active` to now.
    pub async fn touch(&self, id: i64) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE executors SET last_active = {} WHERE id = {}",
            d.placeholder(1),
            d.placeholder(2),
        );
        sqlx::query(&sql)
            .bind(d.format_datetime(self.clock.now()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Recently seen executors, most recent heartbeat first.
    pub async fn list_by_last_active(&self, limit: i64) -> Result<Vec<ExecutorRecord>> {
        let d = self.dialect;
        let sql = format!(
            "SELECT id, name, started, last_active
             FROM executors
             ORDER BY last_active DESC
             LIMIT {}",
            d.placeholder(1),
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let started: String = row.try_get("started")?;
                let last_active: String = row.try_get("last_active")?;
                Ok(ExecutorRecord {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    started: d.parse_datetime("started", &started)?,
                    last_active: d.parse_datetime("last_active", &last_active)?,
                })
            })
            .collect()
    }
}
