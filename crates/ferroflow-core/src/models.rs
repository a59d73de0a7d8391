// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Value types exchanged between user workflows, the engine, and the
//! control plane.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::WorkflowRecord;

/// Classification of a declared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateType {
    /// Entry point of the state machine.
    Start,
    /// Regular state with a registered handler.
    Normal,
    /// Terminal state requiring human intervention.
    Manual,
    /// Terminal error state.
    Error,
    /// Terminal success state.
    End,
}

impl StateType {
    /// Whether interpretation stops when an instance rests in this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, StateType::End | StateType::Manual | StateType::Error)
    }
}

/// One declared state of a user state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSpec {
    pub name: &'static str,
    pub state_type: StateType,
}

impl StateSpec {
    pub fn new(name: &'static str, state_type: StateType) -> Self {
        Self { name, state_type }
    }
}

/// Sentinel successor accepted from any state; finishes the workflow without
/// a declared `End` node.
pub const END_SENTINEL: &str = "END";

/// Request to spawn a child workflow, returned from a handler inside
/// [`NextState::child_workflows`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChildWorkflowRequest {
    pub workflow_type: String,
    pub business_key: String,
    /// Override for the child's initial state; empty means the type's
    /// declared initial state.
    pub initial_state: String,
    pub state_vars: HashMap<String, String>,
}

/// Result of one handler invocation.
#[derive(Debug, Clone, Default)]
pub struct NextState {
    /// Name of the successor state, or [`END_SENTINEL`].
    pub name: String,
    /// Optional text appended to the action log as a `LOG` record.
    pub action_log: String,
    /// Absolute reactivation time; suspends the run after the transition.
    pub next_execution: Option<DateTime<Utc>>,
    /// Human offset ("10 minutes") with the same suspension semantics,
    /// relative to now.
    pub next_execution_offset: String,
    /// Children to spawn under this instance before continuing.
    pub child_workflows: Vec<ChildWorkflowRequest>,
}

impl NextState {
    /// Plain transition to `name`.
    pub fn to(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Transition that finishes the workflow via the `END` sentinel.
    pub fn finish() -> Self {
        Self::to(END_SENTINEL)
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.action_log = log.into();
        self
    }

    pub fn with_next_execution(mut self, at: DateTime<Utc>) -> Self {
        self.next_execution = Some(at);
        self
    }

    pub fn with_next_execution_offset(mut self, offset: impl Into<String>) -> Self {
        self.next_execution_offset = offset.into();
        self
    }

    pub fn with_child(mut self, child: ChildWorkflowRequest) -> Self {
        self.child_workflows.push(child);
        self
    }
}

/// Retry policy declared by a workflow type.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: i64,
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl RetryConfig {
    /// Backoff for the `n`-th failure: a linear slide from `min_interval`
    /// to `max_interval`, clamped on both ends.
    pub fn sliding(&self, n: i64) -> Duration {
        if n <= 0 || self.max_retries <= 0 {
            return self.min_interval;
        }
        if n >= self.max_retries {
            return self.max_interval;
        }
        let scale = n as f64 / self.max_retries as f64;
        let span = (self.max_interval - self.min_interval)
            .num_milliseconds()
            .max(0) as f64;
        self.min_interval + Duration::milliseconds((scale * span) as i64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_interval: Duration::seconds(1),
            max_interval: Duration::minutes(5),
        }
    }
}

/// Payload for creating a workflow instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateWorkflowRequest {
    pub external_id: String,
    pub executor_group: String,
    pub workflow_type: String,
    pub business_key: String,
    pub state_vars: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_activation: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub next_activation_offset: String,
}

/// Returned on successful creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkflowResponse {
    pub id: i64,
}

/// Create a workflow, then poll until its state is one of `wait_for_states`
/// or `wait_seconds` elapses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateAndWaitRequest {
    pub create_workflow_request: CreateWorkflowRequest,
    pub wait_seconds: u64,
    pub check_seconds: u64,
    pub wait_for_states: Vec<String>,
}

/// Filters for the search endpoint. Identity filters (id / external id /
/// business key) are OR-ed together; the rest are AND-ed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchWorkflowRequest {
    pub id: i64,
    pub external_id: String,
    pub business_key: String,
    pub executor_group: String,
    pub workflow_type: String,
    pub state: String,
    pub status: String,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchWorkflowResponse {
    pub results: usize,
    pub offset: i64,
    pub workflows: Vec<WorkflowRecord>,
}

/// Force a state transition from the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateWorkflowStateRequest {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_activation: Option<DateTime<Utc>>,
}

/// Merge a single key into an instance's state vars.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateStateVarRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOkResponse {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_boundaries() {
        let config = RetryConfig {
            max_retries: 3,
            min_interval: Duration::seconds(1),
            max_interval: Duration::seconds(5),
        };
        assert_eq!(config.sliding(-1), Duration::seconds(1));
        assert_eq!(config.sliding(0), Duration::seconds(1));
        assert_eq!(config.sliding(3), Duration::seconds(5));
        assert_eq!(config.sliding(10), Duration::seconds(5));
    }

    #[test]
    fn sliding_is_monotone_between_boundaries() {
        let config = RetryConfig {
            max_retries: 4,
            min_interval: Duration::seconds(2),
            max_interval: Duration::seconds(30),
        };
        let mut previous = config.sliding(0);
        for n in 1..=4 {
            let current = config.sliding(n);
            assert!(current >= previous, "sliding({n}) went backwards");
            previous = current;
        }
    }

    #[test]
    fn sliding_interpolates_linearly() {
        let config = RetryConfig {
            max_retries: 3,
            min_interval: Duration::seconds(1),
            max_interval: Duration::seconds(5),
        };
        // 1s + (1/3) * 4s
        assert_eq!(config.sliding(1), Duration::milliseconds(2333));
        // 1s + (2/3) * 4s
        assert_eq!(config.sliding(2), Duration::milliseconds(3666));
    }

    #[test]
    fn next_state_builder() {
        let next = NextState::to("Fetch")
            .with_log("moving on")
            .with_next_execution_offset("10 minutes");
        assert_eq!(next.name, "Fetch");
        assert_eq!(next.action_log, "moving on");
        assert_eq!(next.next_execution_offset, "10 minutes");
        assert!(next.next_execution.is_none());

        assert_eq!(NextState::finish().name, END_SENTINEL);
    }

    #[test]
    fn create_request_deserializes_camel_case() {
        let json = r#"{
            "externalId": "e1",
            "executorGroup": "default",
            "workflowType": "GetIp",
            "businessKey": "bk-1",
            "stateVars": {"k": "v"}
        }"#;
        let req: CreateWorkflowRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.external_id, "e1");
        assert_eq!(req.workflow_type, "GetIp");
        assert_eq!(req.state_vars.get("k").map(String::as_str), Some("v"));
        assert!(req.next_activation.is_none());
    }
}
