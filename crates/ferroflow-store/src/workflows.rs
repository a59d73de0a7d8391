// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence for workflow instance rows.
//!
//! Every mutation is a single SQL statement; cross-executor coordination
//! never relies on transactions, only on the `modified` column acting as a
//! compare-and-set token. Any write that changes semantically observable
//! state also bumps `modified` to the injected clock's current time.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use tracing::warn;
use uuid::Uuid;

use ferroflow_core::workflow::WorkflowLinks;
use ferroflow_core::{
    parse_offset, ChildWorkflowRequest, Clock, SearchWorkflowRequest, WorkflowRecord,
    WorkflowStatus,
};

use crate::dialect::Dialect;
use crate::error::{Result, StoreError};

const ALL_COLUMNS: &str = "id, status, execution_count, retry_count, created, modified, \
     next_activation, started, executor_id, executor_group, \
     workflow_type, external_id, business_key, state, state_vars, parent_workflow_id";

/// Grouped instance counts per executor group and workflow type.
#[derive(Debug, Clone)]
pub struct WorkflowOverviewRow {
    pub executor_group: String,
    pub workflow_type: String,
    pub new_count: i64,
    pub scheduled_count: i64,
    pub executing_count: i64,
    pub in_progress_count: i64,
    pub finished_count: i64,
}

/// Instance counts per state for one workflow type.
#[derive(Debug, Clone)]
pub struct DefinitionStateRow {
    pub state: String,
    pub new_count: i64,
    pub scheduled_count: i64,
    pub executing_count: i64,
    pub in_progress_count: i64,
    pub finished_count: i64,
}

/// Store for the `workflow` table.
#[derive(Clone)]
pub struct WorkflowStore {
    pool: AnyPool,
    dialect: Dialect,
    clock: Arc<dyn Clock>,
}

impl WorkflowStore {
    pub fn new(pool: AnyPool, dialect: Dialect, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            dialect,
            clock,
        }
    }

    fn map_row(&self, row: &AnyRow) -> Result<WorkflowRecord> {
        let status: String = row.try_get("status")?;
        let status = WorkflowStatus::from_str(&status).map_err(|_| StoreError::Tag {
            column: "status",
            value: status.clone(),
        })?;

        Ok(WorkflowRecord {
            id: row.try_get("id")?,
            status,
            execution_count: row.try_get("execution_count")?,
            retry_count: row.try_get("retry_count")?,
            created: self.parse_column(row, "created")?,
            modified: self.parse_column(row, "modified")?,
            next_activation: self.parse_nullable_column(row, "next_activation")?,
            started: self.parse_nullable_column(row, "started")?,
            executor_id: row.try_get("executor_id")?,
            executor_group: row.try_get("executor_group")?,
            workflow_type: row.try_get("workflow_type")?,
            external_id: row.try_get("external_id")?,
            business_key: row.try_get("business_key")?,
            state: row.try_get("state")?,
            state_vars: row.try_get("state_vars")?,
            parent_workflow_id: row.try_get("parent_workflow_id")?,
        })
    }

    fn parse_column(&self, row: &AnyRow, column: &'static str) -> Result<DateTime<Utc>> {
        let raw: String = row.try_get(column)?;
        self.dialect.parse_datetime(column, &raw)
    }

    fn parse_nullable_column(
        &self,
        row: &AnyRow,
        column: &'static str,
    ) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = row.try_get(column)?;
        raw.map(|value| self.dialect.parse_datetime(column, &value))
            .transpose()
    }

    async fn fetch_all(&self, sql: &str, binds: Vec<SqlArg>) -> Result<Vec<WorkflowRecord>> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = bind.apply(query);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(|row| self.map_row(row)).collect()
    }

    /// Insert a new instance row; returns the generated id.
    ///
    /// A duplicate `external_id` is rejected by the unique index; callers
    /// treat that as "return the existing instance" (see
    /// [`StoreError::is_unique_violation`]).
    pub async fn save(&self, record: &WorkflowRecord) -> Result<i64> {
        let d = self.dialect;
        let placeholders: Vec<String> = (1..=15).map(|i| d.placeholder(i)).collect();
        let base = format!(
            "INSERT INTO workflow (
                status, execution_count, retry_count, created, modified,
                next_activation, started, executor_id, executor_group,
                workflow_type, external_id, business_key, state, state_vars,
                parent_workflow_id
            ) VALUES ({})",
            placeholders.join(", ")
        );

        if d.supports_returning() {
            let sql = format!("{base} RETURNING id");
            let row = Self::bind_insert(sqlx::query(&sql), record, d)
                .fetch_one(&self.pool)
                .await?;
            Ok(row.try_get(0)?)
        } else {
            let result = Self::bind_insert(sqlx::query(&base), record, d)
                .execute(&self.pool)
                .await?;
            result
                .last_insert_id()
                .ok_or(StoreError::MissingInsertId("workflow"))
        }
    }

    fn bind_insert<'q>(
        query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
        record: &WorkflowRecord,
        d: Dialect,
    ) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
        query
            .bind(record.status.to_string())
            .bind(record.execution_count)
            .bind(record.retry_count)
            .bind(d.format_datetime(record.created))
            .bind(d.format_datetime(record.modified))
            .bind(record.next_activation.map(|at| d.format_datetime(at)))
            .bind(record.started.map(|at| d.format_datetime(at)))
            .bind(record.executor_id)
            .bind(record.executor_group.clone())
            .bind(record.workflow_type.clone())
            .bind(record.external_id.clone())
            .bind(record.business_key.clone())
            .bind(record.state.clone())
            .bind(record.state_vars.clone())
            .bind(record.parent_workflow_id)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<WorkflowRecord>> {
        let sql = format!(
            "SELECT {ALL_COLUMNS} FROM workflow WHERE id = {}",
            self.dialect.placeholder(1)
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(|row| self.map_row(&row)).transpose()
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<WorkflowRecord>> {
        let sql = format!(
            "SELECT {ALL_COLUMNS} FROM workflow WHERE external_id = {}",
            self.dialect.placeholder(1)
        );
        let row = sqlx::query(&sql)
            .bind(external_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| self.map_row(&row)).transpose()
    }

    /// Advisory list of claimable instances: unowned, due, in this group.
    /// Callers must still win the claim CAS before touching a row.
    pub async fn find_pending(
        &self,
        batch_size: i64,
        executor_group: &str,
    ) -> Result<Vec<WorkflowRecord>> {
        let d = self.dialect;
        let sql = format!(
            "SELECT {ALL_COLUMNS} FROM workflow
             WHERE {}
               AND status IN ('NEW', 'IN_PROGRESS')
               AND executor_id IS NULL
               AND executor_group = {}
             ORDER BY next_activation ASC
             LIMIT {}",
            d.before_now("next_activation", self.clock.as_ref()),
            d.placeholder(1),
            d.placeholder(2),
        );
        self.fetch_all(
            &sql,
            vec![
                SqlArg::Text(executor_group.to_string()),
                SqlArg::Int(batch_size),
            ],
        )
        .await
    }

    /// Atomically claim an unowned instance, guarded by the caller-observed
    /// `modified` token. Returns true iff exactly one row changed.
    pub async fn claim_for_execution(
        &self,
        id: i64,
        executor_id: i64,
        previous_modified: DateTime<Utc>,
    ) -> Result<bool> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow
             SET status = 'SCHEDULED', modified = {}, executor_id = {}
             WHERE id = {} AND modified = {} AND status IN ('NEW', 'IN_PROGRESS') AND executor_id IS NULL",
            d.now_expr(self.clock.as_ref()),
            d.placeholder(1),
            d.placeholder(2),
            d.placeholder(3),
        );
        let result = sqlx::query(&sql)
            .bind(executor_id)
            .bind(id)
            .bind(d.format_datetime(previous_modified))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Unconditional status update.
    pub async fn set_status(&self, id: i64, status: WorkflowStatus) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow SET status = {}, modified = {} WHERE id = {}",
            d.placeholder(1),
            d.now_expr(self.clock.as_ref()),
            d.placeholder(2),
        );
        sqlx::query(&sql)
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Stamp `started` on first entry into the initial state. A later call
    /// is a no-op because the column is only written while NULL.
    pub async fn set_started_time(&self, id: i64) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow SET started = {} WHERE id = {} AND started IS NULL",
            d.now_expr(self.clock.as_ref()),
            d.placeholder(1),
        );
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Move to a new user state. Resets `retry_count`.
    pub async fn update_state(&self, id: i64, state: &str) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow SET state = {}, modified = {}, retry_count = 0 WHERE id = {}",
            d.placeholder(1),
            d.now_expr(self.clock.as_ref()),
            d.placeholder(2),
        );
        sqlx::query(&sql)
            .bind(state.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace `state_vars` without touching `modified`. Used right after
    /// `update_state`, which already bumped the token.
    pub async fn save_state_vars(&self, id: i64, vars_json: &str) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow SET state_vars = {} WHERE id = {}",
            d.placeholder(1),
            d.placeholder(2),
        );
        sqlx::query(&sql)
            .bind(vars_json.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace `state_vars` and bump `modified`.
    pub async fn save_state_vars_and_touch(&self, id: i64, vars_json: &str) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow SET state_vars = {}, modified = {} WHERE id = {}",
            d.placeholder(1),
            d.now_expr(self.clock.as_ref()),
            d.placeholder(2),
        );
        sqlx::query(&sql)
            .bind(vars_json.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Suspend until a specific time: `IN_PROGRESS` + `next_activation`.
    pub async fn schedule_specific(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow SET status = 'IN_PROGRESS', next_activation = {}, modified = {} WHERE id = {}",
            d.placeholder(1),
            d.now_expr(self.clock.as_ref()),
            d.placeholder(2),
        );
        sqlx::query(&sql)
            .bind(d.format_datetime(at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Suspend for a human offset relative to now (see the offset grammar).
    pub async fn schedule_offset(&self, id: i64, offset: &str) -> Result<()> {
        let duration = match parse_offset(offset) {
            Ok(duration) => duration,
            Err(err) => {
                // Mirror the lenient reading of bare values: fall back to
                // zero so a malformed offset reactivates immediately rather
                // than wedging the instance.
                warn!(workflow_id = id, offset, error = %err, "unparseable offset, scheduling now");
                Duration::zero()
            }
        };
        self.schedule_specific(id, self.clock.now() + duration).await
    }

    /// Release a claim after a completed run.
    pub async fn clear_executor(&self, id: i64) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow SET executor_id = NULL, modified = {} WHERE id = {}",
            d.now_expr(self.clock.as_ref()),
            d.placeholder(1),
        );
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Record a handler failure: release the claim, count the retry, and
    /// schedule the next attempt.
    pub async fn increment_retry_and_schedule(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow
             SET status = 'IN_PROGRESS', executor_id = NULL, retry_count = retry_count + 1,
                 next_activation = {}, modified = {}
             WHERE id = {}",
            d.placeholder(1),
            d.now_expr(self.clock.as_ref()),
            d.placeholder(2),
        );
        sqlx::query(&sql)
            .bind(d.format_datetime(at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Instances that look abandoned: owned, untouched since the cutoff,
    /// and whose owning executor has also stopped heartbeating.
    pub async fn find_stuck(
        &self,
        cutoff_minutes: i64,
        executor_group: &str,
        limit: i64,
    ) -> Result<Vec<WorkflowRecord>> {
        let d = self.dialect;
        let cutoff = self.clock.now() - Duration::minutes(cutoff_minutes);
        let cutoff = d.format_datetime(cutoff);
        let sql = format!(
            "SELECT {ALL_COLUMNS} FROM workflow
             WHERE modified < {}
               AND status IN ('SCHEDULED', 'EXECUTING', 'IN_PROGRESS', 'LOCK')
               AND executor_group = {}
               AND executor_id IS NOT NULL
               AND executor_id NOT IN (
                   SELECT id FROM executors WHERE last_active > {}
               )
             ORDER BY next_activation ASC
             LIMIT {}",
            d.placeholder(1),
            d.placeholder(2),
            d.placeholder(3),
            d.placeholder(4),
        );
        self.fetch_all(
            &sql,
            vec![
                SqlArg::Text(cutoff.clone()),
                SqlArg::Text(executor_group.to_string()),
                SqlArg::Text(cutoff),
                SqlArg::Int(limit),
            ],
        )
        .await
    }

    /// Exclusively lock an instance, guarded by the caller-observed
    /// `modified` token. Used by the repair service and control-plane edits.
    pub async fn lock_by_modified(&self, id: i64, previous_modified: DateTime<Utc>) -> Result<bool> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow
             SET status = 'LOCK', executor_id = NULL, retry_count = retry_count + 1, modified = {}
             WHERE id = {} AND modified = {}",
            d.now_expr(self.clock.as_ref()),
            d.placeholder(1),
            d.placeholder(2),
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(d.format_datetime(previous_modified))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Filtered listing for the control plane. Identity filters are OR-ed,
    /// the rest AND-ed; results newest-first.
    pub async fn search(&self, request: &SearchWorkflowRequest) -> Result<Vec<WorkflowRecord>> {
        let d = self.dialect;
        let mut args: Vec<SqlArg> = Vec::new();
        let mut and_clauses: Vec<String> = Vec::new();
        let mut or_clauses: Vec<String> = Vec::new();

        if request.id != 0 {
            args.push(SqlArg::Int(request.id));
            or_clauses.push(format!("id = {}", d.placeholder(args.len())));
        }
        if !request.external_id.is_empty() {
            args.push(SqlArg::Text(request.external_id.clone()));
            or_clauses.push(format!("external_id = {}", d.placeholder(args.len())));
        }
        if !request.business_key.is_empty() {
            args.push(SqlArg::Text(request.business_key.clone()));
            or_clauses.push(format!("business_key = {}", d.placeholder(args.len())));
        }

        if !request.executor_group.is_empty() {
            args.push(SqlArg::Text(request.executor_group.clone()));
            and_clauses.push(format!("executor_group = {}", d.placeholder(args.len())));
        }
        if !request.workflow_type.is_empty() {
            args.push(SqlArg::Text(request.workflow_type.clone()));
            and_clauses.push(format!("workflow_type = {}", d.placeholder(args.len())));
        }
        if !request.state.is_empty() {
            args.push(SqlArg::Text(request.state.clone()));
            and_clauses.push(format!("state = {}", d.placeholder(args.len())));
        }
        if !request.status.is_empty() {
            args.push(SqlArg::Text(request.status.clone()));
            and_clauses.push(format!("status = {}", d.placeholder(args.len())));
        }

        if !or_clauses.is_empty() {
            and_clauses.push(format!("({})", or_clauses.join(" OR ")));
        }
        let where_clause = if and_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", and_clauses.join(" AND "))
        };
        let limits = if request.limit > 0 {
            format!(" LIMIT {} OFFSET {}", request.limit, request.offset.max(0))
        } else {
            String::new()
        };

        let sql =
            format!("SELECT {ALL_COLUMNS} FROM workflow{where_clause} ORDER BY id DESC{limits}");
        self.fetch_all(&sql, args).await
    }

    /// Grouped counts for the dashboard home view.
    pub async fn overview(&self) -> Result<Vec<WorkflowOverviewRow>> {
        let sql = "SELECT
                executor_group,
                workflow_type,
                COUNT(CASE WHEN status = 'NEW' THEN 1 END) AS new_count,
                COUNT(CASE WHEN status = 'SCHEDULED' THEN 1 END) AS scheduled_count,
                COUNT(CASE WHEN status = 'EXECUTING' THEN 1 END) AS executing_count,
                COUNT(CASE WHEN status = 'IN_PROGRESS' THEN 1 END) AS in_progress_count,
                COUNT(CASE WHEN status = 'FINISHED' THEN 1 END) AS finished_count
            FROM workflow
            GROUP BY executor_group, workflow_type";
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(WorkflowOverviewRow {
                    executor_group: row.try_get("executor_group")?,
                    workflow_type: row.try_get("workflow_type")?,
                    new_count: row.try_get("new_count")?,
                    scheduled_count: row.try_get("scheduled_count")?,
                    executing_count: row.try_get("executing_count")?,
                    in_progress_count: row.try_get("in_progress_count")?,
                    finished_count: row.try_get("finished_count")?,
                })
            })
            .collect()
    }

    /// Counts by state for one workflow type.
    pub async fn state_overview(&self, workflow_type: &str) -> Result<Vec<DefinitionStateRow>> {
        let d = self.dialect;
        let sql = format!(
            "SELECT
                state,
                COUNT(CASE WHEN status = 'NEW' THEN 1 END) AS new_count,
                COUNT(CASE WHEN status = 'SCHEDULED' THEN 1 END) AS scheduled_count,
                COUNT(CASE WHEN status = 'EXECUTING' THEN 1 END) AS executing_count,
                COUNT(CASE WHEN status = 'IN_PROGRESS' THEN 1 END) AS in_progress_count,
                COUNT(CASE WHEN status = 'FINISHED' THEN 1 END) AS finished_count
            FROM workflow
            WHERE workflow_type = {}
            GROUP BY state
            ORDER BY state",
            d.placeholder(1),
        );
        let rows = sqlx::query(&sql)
            .bind(workflow_type.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(DefinitionStateRow {
                    state: row.try_get("state")?,
                    new_count: row.try_get("new_count")?,
                    scheduled_count: row.try_get("scheduled_count")?,
                    executing_count: row.try_get("executing_count")?,
                    in_progress_count: row.try_get("in_progress_count")?,
                    finished_count: row.try_get("finished_count")?,
                })
            })
            .collect()
    }

    /// Currently running instances, most recently touched first.
    pub async fn top_executing(&self, limit: i64) -> Result<Vec<WorkflowRecord>> {
        let sql = format!(
            "SELECT {ALL_COLUMNS} FROM workflow
             WHERE status = 'EXECUTING'
             ORDER BY modified DESC
             LIMIT {}",
            self.dialect.placeholder(1),
        );
        self.fetch_all(&sql, vec![SqlArg::Int(limit)]).await
    }

    /// Upcoming instances ordered by activation time.
    pub async fn next_to_execute(&self, limit: i64) -> Result<Vec<WorkflowRecord>> {
        let sql = format!(
            "SELECT {ALL_COLUMNS} FROM workflow
             WHERE status IN ('NEW', 'IN_PROGRESS')
             ORDER BY next_activation ASC
             LIMIT {}",
            self.dialect.placeholder(1),
        );
        self.fetch_all(&sql, vec![SqlArg::Int(limit)]).await
    }

    /// Children of a parent instance. `only_active` filters out terminal
    /// rows.
    pub async fn find_children_by_parent(
        &self,
        parent_id: i64,
        only_active: bool,
    ) -> Result<Vec<WorkflowRecord>> {
        let active_filter = if only_active {
            " AND status NOT IN ('FINISHED', 'FAILED')"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {ALL_COLUMNS} FROM workflow
             WHERE parent_workflow_id = {}{active_filter}
             ORDER BY id ASC",
            self.dialect.placeholder(1),
        );
        self.fetch_all(&sql, vec![SqlArg::Int(parent_id)]).await
    }

    /// Make an instance claimable now. Used to wake a suspended parent when
    /// a child completes.
    pub async fn wake(&self, id: i64) -> Result<()> {
        let d = self.dialect;
        let sql = format!(
            "UPDATE workflow SET next_activation = {}, modified = {} WHERE id = {}",
            d.now_expr(self.clock.as_ref()),
            d.now_expr(self.clock.as_ref()),
            d.placeholder(1),
        );
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a child instance under `parent_id`, claimable immediately.
    pub async fn create_child(
        &self,
        parent_id: i64,
        request: &ChildWorkflowRequest,
        initial_state: &str,
        executor_group: &str,
    ) -> Result<WorkflowRecord> {
        let now = self.clock.now();
        let state_vars = if request.state_vars.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&request.state_vars)?)
        };
        let child = WorkflowRecord {
            id: 0,
            status: WorkflowStatus::New,
            execution_count: 0,
            retry_count: 0,
            created: now,
            modified: now,
            next_activation: Some(now),
            started: None,
            executor_id: None,
            executor_group: executor_group.to_string(),
            workflow_type: request.workflow_type.clone(),
            external_id: format!("child-{parent_id}-{}", Uuid::new_v4()),
            business_key: request.business_key.clone(),
            state: initial_state.to_string(),
            state_vars,
            parent_workflow_id: Some(parent_id),
        };
        let id = self.save(&child).await?;
        Ok(WorkflowRecord { id, ..child })
    }
}

#[async_trait]
impl WorkflowLinks for WorkflowStore {
    async fn children_of(
        &self,
        parent_id: i64,
        only_active: bool,
    ) -> anyhow::Result<Vec<WorkflowRecord>> {
        Ok(self.find_children_by_parent(parent_id, only_active).await?)
    }

    async fn wake_workflow(&self, workflow_id: i64) -> anyhow::Result<()> {
        Ok(self.wake(workflow_id).await?)
    }
}

/// Owned bind value for runtime-assembled statements.
pub(crate) enum SqlArg {
    Int(i64),
    Text(String),
}

impl SqlArg {
    pub(crate) fn apply<'q>(
        self,
        query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
        match self {
            SqlArg::Int(value) => query.bind(value),
            SqlArg::Text(value) => query.bind(value),
        }
    }
}
