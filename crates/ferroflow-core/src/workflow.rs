// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The contract every user workflow implements.
//!
//! A workflow declares its states and transitions, and dispatches handler
//! invocations by state name through [`Workflow::handle`]. The engine
//! validates at registration time that every `Start`/`Normal` state appears
//! in [`Workflow::handled_states`], so a missing arm in the dispatch match is
//! caught before the first instance runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::clock::Clock;
use crate::domain::WorkflowRecord;
use crate::models::{NextState, RetryConfig, StateSpec};

/// Failure of a single handler invocation.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The dispatch function has no arm for the requested state. This is a
    /// programmer fault; the run aborts and the instance stays claimed until
    /// the repair service frees it.
    #[error("no handler for state '{0}'")]
    Unhandled(String),

    /// The handler ran and failed. Counted against the retry budget and
    /// rescheduled with backoff.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Parent/child operations a handler may perform through its context.
///
/// Implemented by the workflow store; workflows never hold in-memory
/// pointers to related instances, all coordination goes through these.
#[async_trait]
pub trait WorkflowLinks: Send + Sync {
    /// Children of the given parent. `only_active` filters out instances
    /// that already reached `FINISHED` or `FAILED`.
    async fn children_of(
        &self,
        parent_id: i64,
        only_active: bool,
    ) -> anyhow::Result<Vec<WorkflowRecord>>;

    /// Make the parent claimable now by resetting its `next_activation`.
    async fn wake_workflow(&self, workflow_id: i64) -> anyhow::Result<()>;
}

/// Ambient context passed to every handler invocation.
pub struct WorkflowContext {
    record: WorkflowRecord,
    clock: Arc<dyn Clock>,
    links: Arc<dyn WorkflowLinks>,
}

impl WorkflowContext {
    pub fn new(
        record: WorkflowRecord,
        clock: Arc<dyn Clock>,
        links: Arc<dyn WorkflowLinks>,
    ) -> Self {
        Self {
            record,
            clock,
            links,
        }
    }

    /// The claimed instance row as it was read at the start of the run.
    pub fn record(&self) -> &WorkflowRecord {
        &self.record
    }

    pub fn workflow_id(&self) -> i64 {
        self.record.id
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Children spawned by this instance.
    pub async fn children(&self, only_active: bool) -> anyhow::Result<Vec<WorkflowRecord>> {
        self.links.children_of(self.record.id, only_active).await
    }

    /// Wake this instance's parent, if it has one.
    pub async fn wake_parent(&self) -> anyhow::Result<()> {
        match self.record.parent_workflow_id {
            Some(parent_id) => self.links.wake_workflow(parent_id).await,
            None => Ok(()),
        }
    }
}

/// A user-defined finite state machine.
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Name of the entry state; must be declared with type `Start`.
    fn initial_state(&self) -> &str;

    /// Human description, stored on the definition record.
    fn description(&self) -> &str;

    /// Allowed successors per state (one-to-many).
    fn state_transitions(&self) -> HashMap<&'static str, Vec<&'static str>>;

    /// Every declared state with its type.
    fn all_states(&self) -> Vec<StateSpec>;

    /// States the dispatch function covers. Registration fails if any
    /// declared `Start`/`Normal` state is missing from this list.
    fn handled_states(&self) -> Vec<&'static str>;

    /// Retry policy for handler failures.
    fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
    }

    /// Load the persisted row into the in-memory state-var map. The map is
    /// reset before loading so a reused factory output cannot leak state.
    fn setup(&mut self, record: &WorkflowRecord);

    /// The in-memory state-var map as last mutated by a handler.
    fn state_vars(&self) -> &HashMap<String, String>;

    /// Run the handler for `state`.
    async fn handle(
        &mut self,
        state: &str,
        ctx: &WorkflowContext,
    ) -> Result<NextState, HandlerError>;
}

/// Common state carried by workflow implementations.
///
/// Embed this in a workflow struct and delegate `setup`/`state_vars` to it.
#[derive(Debug, Default, Clone)]
pub struct WorkflowData {
    pub state_vars: HashMap<String, String>,
}

impl WorkflowData {
    /// Reset the map and load it from the record's `state_vars` JSON.
    pub fn setup(&mut self, record: &WorkflowRecord) {
        self.state_vars = HashMap::new();
        let Some(raw) = record.state_vars.as_deref() else {
            return;
        };
        if raw.is_empty() || raw == "null" {
            return;
        }
        match serde_json::from_str::<HashMap<String, String>>(raw) {
            Ok(vars) => self.state_vars = vars,
            Err(err) => {
                error!(workflow_id = record.id, error = %err, "failed to parse state vars");
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.state_vars.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.state_vars.insert(key.into(), value.into());
    }

    /// Store a serializable value under `key` as embedded JSON.
    pub fn set_json<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> anyhow::Result<()> {
        self.state_vars
            .insert(key.into(), serde_json::to_string(value)?);
        Ok(())
    }

    /// Load an embedded JSON value stored with [`set_json`](Self::set_json).
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.state_vars.get(key) {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkflowStatus;
    use serde::Deserialize;

    fn record_with_vars(vars: Option<&str>) -> WorkflowRecord {
        WorkflowRecord {
            id: 1,
            status: WorkflowStatus::New,
            execution_count: 0,
            retry_count: 0,
            created: Utc::now(),
            modified: Utc::now(),
            next_activation: None,
            started: None,
            executor_id: None,
            executor_group: "default".into(),
            workflow_type: "Test".into(),
            external_id: "e1".into(),
            business_key: "bk".into(),
            state: "Init".into(),
            state_vars: vars.map(str::to_string),
            parent_workflow_id: None,
        }
    }

    #[test]
    fn setup_loads_vars() {
        let mut data = WorkflowData::default();
        data.setup(&record_with_vars(Some(r#"{"ip":"127.0.0.1"}"#)));
        assert_eq!(data.get("ip"), Some("127.0.0.1"));
    }

    #[test]
    fn setup_resets_previous_vars() {
        let mut data = WorkflowData::default();
        data.set("stale", "yes");
        data.setup(&record_with_vars(Some(r#"{"fresh":"yes"}"#)));
        assert_eq!(data.get("stale"), None);
        assert_eq!(data.get("fresh"), Some("yes"));
    }

    #[test]
    fn setup_tolerates_missing_and_null_vars() {
        let mut data = WorkflowData::default();
        data.set("stale", "yes");
        data.setup(&record_with_vars(None));
        // No persisted vars: the map resets to empty.
        assert!(data.state_vars.is_empty());

        data.set("stale", "yes");
        data.setup(&record_with_vars(Some("null")));
        assert!(data.state_vars.is_empty());
    }

    #[test]
    fn json_round_trip_through_vars() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Progress {
            fetched: u32,
        }

        let mut data = WorkflowData::default();
        data.set_json("progress", &Progress { fetched: 7 }).unwrap();
        let loaded: Option<Progress> = data.get_json("progress").unwrap();
        assert_eq!(loaded, Some(Progress { fetched: 7 }));

        let missing: Option<Progress> = data.get_json("absent").unwrap();
        assert!(missing.is_none());
    }
}
