// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistent domain records.
//!
//! These structs mirror the relational schema one-to-one. The stores own them
//! at rest; while a workflow instance is being executed exactly one worker
//! holds its [`WorkflowRecord`] in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle status of a workflow instance row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    /// Freshly created, never claimed.
    New,
    /// Claimed by an executor, waiting for a worker.
    Scheduled,
    /// A worker is interpreting the instance right now.
    Executing,
    /// Released back to the pool with a future (or past) activation time.
    InProgress,
    /// Exclusively locked by the repair service or a control-plane edit.
    Lock,
    /// Reached a terminal state.
    Finished,
    /// Exhausted its retries.
    Failed,
}

impl WorkflowStatus {
    /// Statuses that may never be claimed or mutated again.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Finished | WorkflowStatus::Failed)
    }
}

/// One workflow instance row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// Surrogate primary key.
    pub id: i64,
    pub status: WorkflowStatus,
    pub execution_count: i64,
    pub retry_count: i64,
    pub created: DateTime<Utc>,
    /// Optimistic-lock token; bumped on every semantically observable write.
    pub modified: DateTime<Utc>,
    pub next_activation: Option<DateTime<Utc>>,
    /// Set once, on first entry into the initial state.
    pub started: Option<DateTime<Utc>>,
    /// Owning executor row id while claimed, NULL at rest.
    pub executor_id: Option<i64>,
    pub executor_group: String,
    pub workflow_type: String,
    /// Caller-supplied, globally unique.
    pub external_id: String,
    pub business_key: String,
    /// Current node of the user state machine.
    pub state: String,
    /// Opaque JSON object (string -> string) owned by the user workflow.
    pub state_vars: Option<String>,
    pub parent_workflow_id: Option<i64>,
}

/// Kind of audit record appended to the action log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Scheduled,
    Executing,
    Starting,
    Transition,
    Log,
    ScheduleActivation,
    Retry,
    Error,
    Failed,
    Finished,
    End,
    LockFailed,
    Repaired,
    ChildCreated,
}

/// Append-only audit record documenting one event in an instance's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: i64,
    pub workflow_id: i64,
    /// Executor that produced the event; 0 for control-plane writes.
    pub executor_id: i64,
    pub execution_count: i64,
    pub retry_count: i64,
    pub action_type: ActionType,
    pub name: String,
    pub text: String,
    pub date_time: DateTime<Utc>,
}

/// One live engine process, tracked for liveness by the repair service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorRecord {
    pub id: i64,
    pub name: String,
    pub started: DateTime<Utc>,
    /// Heartbeat, refreshed every 30 s while the process lives.
    pub last_active: DateTime<Utc>,
}

/// A registered workflow type, upserted at engine startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionRecord {
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Mermaid flow chart rendered from the declared transitions.
    pub flow_chart: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            WorkflowStatus::New,
            WorkflowStatus::Scheduled,
            WorkflowStatus::Executing,
            WorkflowStatus::InProgress,
            WorkflowStatus::Lock,
            WorkflowStatus::Finished,
            WorkflowStatus::Failed,
        ] {
            let text = status.to_string();
            assert_eq!(WorkflowStatus::from_str(&text).unwrap(), status);
        }
        assert_eq!(WorkflowStatus::InProgress.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn action_type_uses_screaming_snake_case() {
        assert_eq!(
            ActionType::ScheduleActivation.to_string(),
            "SCHEDULE_ACTIVATION"
        );
        assert_eq!(ActionType::LockFailed.to_string(), "LOCK_FAILED");
        assert_eq!(ActionType::ChildCreated.to_string(), "CHILD_CREATED");
    }

    #[test]
    fn terminal_statuses() {
        assert!(WorkflowStatus::Finished.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(!WorkflowStatus::InProgress.is_terminal());
        assert!(!WorkflowStatus::Lock.is_terminal());
    }
}
