// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Append-only audit log of workflow actions.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use ferroflow_core::{ActionRecord, ActionType, Clock};

use crate::dialect::Dialect;
use crate::error::{Result, StoreError};

/// Fields of a new action record; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAction {
    pub workflow_id: i64,
    pub executor_id: i64,
    pub execution_count: i64,
    pub retry_count: i64,
    pub action_type: ActionType,
    pub name: String,
    pub text: String,
}

impl NewAction {
    pub fn new(
        workflow_id: i64,
        executor_id: i64,
        action_type: ActionType,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id,
            executor_id,
            execution_count: 0,
            retry_count: 0,
            action_type,
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn with_counts(mut self, execution_count: i64, retry_count: i64) -> Self {
        self.execution_count = execution_count;
        self.retry_count = retry_count;
        self
    }
}

/// Store for the `workflow_actions` table.
#[derive(Clone)]
pub struct ActionStore {
    pool: AnyPool,
    dialect: Dialect,
    clock: Arc<dyn Clock>,
}

impl ActionStore {
    pub fn new(pool: AnyPool, dialect: Dialect, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            dialect,
            clock,
        }
    }

    /// Append one action; returns its id.
    pub async fn save(&self, action: &NewAction) -> Result<i64> {
        let d = self.dialect;
        let placeholders: Vec<String> = (1..=8).map(|i| d.placeholder(i)).collect();
        let base = format!(
            "INSERT INTO workflow_actions (
                workflow_id, executor_id, execution_count, retry_count, type, name, text, date_time
            ) VALUES ({})",
            placeholders.join(", ")
        );
        let date_time = d.format_datetime(self.clock.now());

        if d.supports_returning() {
            let sql = format!("{base} RETURNING id");
            let row = sqlx::query(&sql)
                .bind(action.workflow_id)
                .bind(action.executor_id)
                .bind(action.execution_count)
                .bind(action.retry_count)
                .bind(action.action_type.to_string())
                .bind(action.name.clone())
                .bind(action.text.clone())
                .bind(date_time)
                .fetch_one(&self.pool)
                .await?;
            Ok(row.try_get(0)?)
        } else {
            let result = sqlx::query(&base)
                .bind(action.workflow_id)
                .bind(action.executor_id)
                .bind(action.execution_count)
                .bind(action.retry_count)
                .bind(action.action_type.to_string())
                .bind(action.name.clone())
                .bind(action.text.clone())
                .bind(date_time)
                .execute(&self.pool)
                .await?;
            result
                .last_insert_id()
                .ok_or(StoreError::MissingInsertId("workflow_actions"))
        }
    }

    /// All actions of one instance, newest first.
    pub async fn find_by_workflow(&self, workflow_id: i64) -> Result<Vec<ActionRecord>> {
        let sql = format!(
            "SELECT id, workflow_id, executor_id, execution_count, retry_count, type, name, text, date_time
             FROM workflow_actions
             WHERE workflow_id = {}
             ORDER BY id DESC",
            self.dialect.placeholder(1),
        );
        let rows = sqlx::query(&sql)
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| self.map_row(row)).collect()
    }

    fn map_row(&self, row: &AnyRow) -> Result<ActionRecord> {
        let action_type: String = row.try_get("type")?;
        let action_type = ActionType::from_str(&action_type).map_err(|_| StoreError::Tag {
            column: "type",
            value: action_type.clone(),
        })?;
        let date_time: String = row.try_get("date_time")?;

        Ok(ActionRecord {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            executor_id: row.try_get("executor_id")?,
            execution_count: row.try_get("execution_count")?,
            retry_count: row.try_get("retry_count")?,
            action_type,
            name: row.try_get("name")?,
            text: row.try_get("text")?,
            date_time: self.dialect.parse_datetime("date_time", &date_time)?,
        })
    }
}
