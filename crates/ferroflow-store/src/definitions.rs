// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Registered workflow definitions.
//!
//! Upserted once per process start; read by the control plane.

use std::sync::Arc;

use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use ferroflow_core::{Clock, DefinitionRecord};

use crate::dialect::Dialect;
use crate::error::Result;

/// Store for the `workflow_definitions` table.
#[derive(Clone)]
pub struct DefinitionStore {
    pool: AnyPool,
    dialect: Dialect,
    clock: Arc<dyn Clock>,
}

impl DefinitionStore {
    pub fn new(pool: AnyPool, dialect: Dialect, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            dialect,
            clock,
        }
    }

    /// Insert the definition or, when the name exists, refresh its
    /// description, flow chart and `updated` timestamp.
    pub async fn upsert(&self, name: &str, description: &str, flow_chart: &str) -> Result<()> {
        let d = self.dialect;
        let now = d.format_datetime(self.clock.now());
        let placeholders: Vec<String> = (1..=5).map(|i| d.placeholder(i)).collect();
        let values = placeholders.join(", ");

        let sql = match d {
            Dialect::Postgres | Dialect::Sqlite => format!(
                "INSERT INTO workflow_definitions (name, description, created, updated, flow_chart)
                 VALUES ({values})
                 ON CONFLICT (name)
                 DO UPDATE SET description = EXCLUDED.description,
                     updated = EXCLUDED.updated,
                     flow_chart = EXCLUDED.flow_chart"
            ),
            Dialect::MySql => format!(
                "INSERT INTO workflow_definitions (name, description, created, updated, flow_chart)
                 VALUES ({values})
                 ON DUPLICATE KEY UPDATE description = VALUES(description),
                     updated = VALUES(updated),
                     flow_chart = VALUES(flow_chart)"
            ),
        };

        sqlx::query(&sql)
            .bind(name.to_string())
            .bind(description.to_string())
            .bind(now.clone())
            .bind(now)
            .bind(flow_chart.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<DefinitionRecord>> {
        let sql = format!(
            "SELECT name, description, created, updated, flow_chart
             FROM workflow_definitions WHERE name = {}",
            self.dialect.placeholder(1),
        );
        let row = sqlx::query(&sql)
            .bind(name.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| self.map_row(&row)).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<DefinitionRecord>> {
        let sql = "SELECT name, description, created, updated, flow_chart
             FROM workflow_definitions ORDER BY name";
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| self.map_row(row)).collect()
    }

    fn map_row(&self, row: &AnyRow) -> Result<DefinitionRecord> {
        let created: String = row.try_get("created")?;
        let updated: String = row.try_get("updated")?;
        Ok(DefinitionRecord {
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created: self.dialect.parse_datetime("created", &created)?,
            updated: self.dialect.parse_datetime("updated", &updated)?,
            flow_chart: row.try_get("flow_chart")?,
        })
    }
}
