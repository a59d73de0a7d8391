// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared test infrastructure for engine end-to-end tests.
//!
//! Each test gets its own temporary SQLite database, a manual clock, and an
//! engine wired with short real-time intervals. Tests drive persisted time
//! by advancing the clock and nudging the poller.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use tempfile::TempDir;

use ferroflow_core::{
    ChildWorkflowRequest, CreateWorkflowRequest, HandlerError, ManualClock, NextState, RetryConfig,
    StateSpec, StateType, Workflow, WorkflowContext, WorkflowData, WorkflowRecord, WorkflowStatus,
};
use ferroflow_engine::{EngineConfig, EngineHandle, WorkflowManager, WorkflowRegistry};
use ferroflow_store::{
    connect, schema, ActionStore, DefinitionStore, Dialect, ExecutorStore, WorkflowStore,
};

pub struct TestContext {
    _dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub manager: WorkflowManager,
    pub workflows: WorkflowStore,
    pub actions: ActionStore,
    pub executors: ExecutorStore,
    pub definitions: DefinitionStore,
    engine: Option<EngineHandle>,
}

impl TestContext {
    /// Build the context without starting the engine tasks.
    pub async fn new(registry: WorkflowRegistry) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine-test.db");
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = connect(&url).await.expect("connect sqlite");
        schema::ensure_schema(&pool, Dialect::Sqlite)
            .await
            .expect("ensure schema");

        let clock = Arc::new(ManualClock::starting_now());
        let config = EngineConfig {
            dialect: Dialect::Sqlite,
            database_url: Some(url),
            database_file: path.display().to_string(),
            server_port: 0,
            check_db_interval: StdDuration::from_millis(50),
            // Tests drive repair passes explicitly via repair_now().
            stuck_interval: StdDuration::from_secs(30),
            stuck_after_minutes: 5,
            batch_size: 5,
            executor_group: "default".to_string(),
            executor_size: 2,
            session_expiry_hours: 1,
            executor_name: Some("test-executor".to_string()),
        };

        let manager = WorkflowManager::new(pool.clone(), config, registry, clock.clone());
        Self {
            _dir: dir,
            workflows: WorkflowStore::new(pool.clone(), Dialect::Sqlite, clock.clone()),
            actions: ActionStore::new(pool.clone(), Dialect::Sqlite, clock.clone()),
            executors: ExecutorStore::new(pool.clone(), Dialect::Sqlite, clock.clone()),
            definitions: DefinitionStore::new(pool, Dialect::Sqlite, clock.clone()),
            clock,
            manager,
            engine: None,
        }
    }

    /// Build the context and start the engine.
    pub async fn started(registry: WorkflowRegistry) -> Self {
        let mut context = Self::new(registry).await;
        context.start().await;
        context
    }

    pub async fn start(&mut self) {
        let engine = self.manager.start().await.expect("start engine");
        self.engine = Some(engine);
    }

    pub async fn shutdown(mut self) {
        if let Some(engine) = self.engine.take() {
            engine.shutdown().await;
        }
    }

    /// Create an instance due "now" (claimable after the next advance).
    pub async fn create(&self, external_id: &str, workflow_type: &str) -> i64 {
        self.manager
            .create_workflow(&CreateWorkflowRequest {
                external_id: external_id.to_string(),
                executor_group: "default".to_string(),
                workflow_type: workflow_type.to_string(),
                business_key: format!("bk-{external_id}"),
                state_vars: HashMap::new(),
                next_activation: None,
                next_activation_offset: String::new(),
            })
            .await
            .expect("create workflow")
    }

    /// Advance persisted time and nudge the poller.
    pub fn advance(&self, delta: Duration) {
        self.clock.advance(delta);
        self.manager.wakeup();
    }

    pub async fn reload(&self, id: i64) -> WorkflowRecord {
        self.workflows
            .find_by_id(id)
            .await
            .expect("find workflow")
            .expect("workflow exists")
    }

    /// Poll (real time) until the predicate holds or ten seconds elapse.
    pub async fn wait_for<F>(&self, id: i64, what: &str, predicate: F) -> WorkflowRecord
    where
        F: Fn(&WorkflowRecord) -> bool,
    {
        let deadline = tokio::time::Instant::now() + StdDuration::from_secs(10);
        loop {
            let workflow = self.reload(id).await;
            if predicate(&workflow) {
                return workflow;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for {what}; last seen: {workflow:?}");
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
    }

    pub async fn wait_for_status(&self, id: i64, status: WorkflowStatus) -> WorkflowRecord {
        self.wait_for(id, &format!("status {status}"), |workflow| {
            workflow.status == status
        })
        .await
    }

    /// Action types for an instance, oldest first.
    pub async fn action_types(&self, id: i64) -> Vec<ferroflow_core::ActionType> {
        let mut actions = self.actions.find_by_workflow(id).await.expect("list actions");
        actions.reverse();
        actions.into_iter().map(|action| action.action_type).collect()
    }
}

// ---------------------------------------------------------------------
// Test workflows
// ---------------------------------------------------------------------

/// `Init(Start) -> Fetch(Normal) -> Done(End)`, always succeeds.
#[derive(Default)]
pub struct QuickWorkflow {
    data: WorkflowData,
}

#[async_trait]
impl Workflow for QuickWorkflow {
    fn initial_state(&self) -> &str {
        "Init"
    }

    fn description(&self) -> &str {
        "quick three-state workflow"
    }

    fn state_transitions(&self) -> HashMap<&'static str, Vec<&'static str>> {
        HashMap::from([("Init", vec!["Fetch"]), ("Fetch", vec!["Done"])])
    }

    fn all_states(&self) -> Vec<StateSpec> {
        vec![
            StateSpec::new("Init", StateType::Start),
            StateSpec::new("Fetch", StateType::Normal),
            StateSpec::new("Done", StateType::End),
        ]
    }

    fn handled_states(&self) -> Vec<&'static str> {
        vec!["Init", "Fetch"]
    }

    fn setup(&mut self, record: &WorkflowRecord) {
        self.data.setup(record);
    }

    fn state_vars(&self) -> &HashMap<String, String> {
        &self.data.state_vars
    }

    async fn handle(
        &mut self,
        state: &str,
        _ctx: &WorkflowContext,
    ) -> Result<NextState, HandlerError> {
        match state {
            "Init" => Ok(NextState::to("Fetch")),
            "Fetch" => {
                self.data.set("fetched", "true");
                Ok(NextState::to("Done"))
            }
            other => Err(HandlerError::Unhandled(other.to_string())),
        }
    }
}

/// Like [`QuickWorkflow`], but `Fetch` fails until the shared attempt
/// counter reaches `fail_times`.
pub struct FlakyWorkflow {
    data: WorkflowData,
    attempts: Arc<AtomicUsize>,
    fail_times: usize,
}

impl FlakyWorkflow {
    pub fn new(attempts: Arc<AtomicUsize>, fail_times: usize) -> Self {
        Self {
            data: WorkflowData::default(),
            attempts,
            fail_times,
        }
    }
}

#[async_trait]
impl Workflow for FlakyWorkflow {
    fn initial_state(&self) -> &str {
        "Init"
    }

    fn description(&self) -> &str {
        "workflow whose fetch step fails a configured number of times"
    }

    fn state_transitions(&self) -> HashMap<&'static str, Vec<&'static str>> {
        HashMap::from([("Init", vec!["Fetch"]), ("Fetch", vec!["Done"])])
    }

    fn all_states(&self) -> Vec<StateSpec> {
        vec![
            StateSpec::new("Init", StateType::Start),
            StateSpec::new("Fetch", StateType::Normal),
            StateSpec::new("Done", StateType::End),
        ]
    }

    fn handled_states(&self) -> Vec<&'static str> {
        vec!["Init", "Fetch"]
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            min_interval: Duration::seconds(1),
            max_interval: Duration::seconds(5),
        }
    }

    fn setup(&mut self, record: &WorkflowRecord) {
        self.data.setup(record);
    }

    fn state_vars(&self) -> &HashMap<String, String> {
        &self.data.state_vars
    }

    async fn handle(
        &mut self,
        state: &str,
        _ctx: &WorkflowContext,
    ) -> Result<NextState, HandlerError> {
        match state {
            "Init" => Ok(NextState::to("Fetch")),
            "Fetch" => {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < self.fail_times {
                    Err(HandlerError::Failed(anyhow::anyhow!(
                        "fetch attempt {attempt} failed"
                    )))
                } else {
                    Ok(NextState::to("Done"))
                }
            }
            other => Err(HandlerError::Unhandled(other.to_string())),
        }
    }
}

/// `Init(Start) -> Wait(Normal) -> Done(End)`; the first run suspends for
/// ten minutes after entering `Wait`.
#[derive(Default)]
pub struct SleepyWorkflow {
    data: WorkflowData,
}

#[async_trait]
impl Workflow for SleepyWorkflow {
    fn initial_state(&self) -> &str {
        "Init"
    }

    fn description(&self) -> &str {
        "workflow that suspends for ten minutes before finishing"
    }

    fn state_transitions(&self) -> HashMap<&'static str, Vec<&'static str>> {
        HashMap::from([("Init", vec!["Wait"]), ("Wait", vec!["Done"])])
    }

    fn all_states(&self) -> Vec<StateSpec> {
        vec![
            StateSpec::new("Init", StateType::Start),
            StateSpec::new("Wait", StateType::Normal),
            StateSpec::new("Done", StateType::End),
        ]
    }

    fn handled_states(&self) -> Vec<&'static str> {
        vec!["Init", "Wait"]
    }

    fn setup(&mut self, record: &WorkflowRecord) {
        self.data.setup(record);
    }

    fn state_vars(&self) -> &HashMap<String, String> {
        &self.data.state_vars
    }

    async fn handle(
        &mut self,
        state: &str,
        ctx: &WorkflowContext,
    ) -> Result<NextState, HandlerError> {
        match state {
            "Init" => {
                Ok(NextState::to("Wait").with_next_execution(ctx.now() + Duration::minutes(10)))
            }
            "Wait" => Ok(NextState::to("Done")),
            other => Err(HandlerError::Unhandled(other.to_string())),
        }
    }
}

/// Parent of two [`WakingChildWorkflow`]s; suspends while they run.
#[derive(Default)]
pub struct ParentWorkflow {
    data: WorkflowData,
}

#[async_trait]
impl Workflow for ParentWorkflow {
    fn initial_state(&self) -> &str {
        "ParentInit"
    }

    fn description(&self) -> &str {
        "parent workflow coordinating two children"
    }

    fn state_transitions(&self) -> HashMap<&'static str, Vec<&'static str>> {
        HashMap::from([
            ("ParentInit", vec!["Spawn"]),
            ("Spawn", vec!["WaitChildren"]),
            ("WaitChildren", vec!["WaitChildren", "ParentDone"]),
        ])
    }

    fn all_states(&self) -> Vec<StateSpec> {
        vec![
            StateSpec::new("ParentInit", StateType::Start),
            StateSpec::new("Spawn", StateType::Normal),
            StateSpec::new("WaitChildren", StateType::Normal),
            StateSpec::new("ParentDone", StateType::End),
        ]
    }

    fn handled_states(&self) -> Vec<&'static str> {
        vec!["ParentInit", "Spawn", "WaitChildren"]
    }

    fn setup(&mut self, record: &WorkflowRecord) {
        self.data.setup(record);
    }

    fn state_vars(&self) -> &HashMap<String, String> {
        &self.data.state_vars
    }

    async fn handle(
        &mut self,
        state: &str,
        ctx: &WorkflowContext,
    ) -> Result<NextState, HandlerError> {
        match state {
            "ParentInit" => Ok(NextState::to("Spawn")),
            "Spawn" => {
                let mut next = NextState::to("WaitChildren");
                for label in ["one", "two"] {
                    next.child_workflows.push(ChildWorkflowRequest {
                        workflow_type: "WakingChild".to_string(),
                        business_key: format!("child-{label}"),
                        initial_state: String::new(),
                        state_vars: HashMap::from([(
                            "label".to_string(),
                            label.to_string(),
                        )]),
                    });
                }
                Ok(next)
            }
            "WaitChildren" => {
                let children = ctx.children(false).await?;
                let finished = children
                    .iter()
                    .filter(|child| child.status == WorkflowStatus::Finished)
                    .count();
                if children.len() < 2 || finished < 2 {
                    return Ok(NextState::to("WaitChildren")
                        .with_next_execution_offset("10 minutes"));
                }
                Ok(NextState::to("ParentDone"))
            }
            other => Err(HandlerError::Unhandled(other.to_string())),
        }
    }
}

/// Child that wakes its parent as it completes.
#[derive(Default)]
pub struct WakingChildWorkflow {
    data: WorkflowData,
}

#[async_trait]
impl Workflow for WakingChildWorkflow {
    fn initial_state(&self) -> &str {
        "ChildInit"
    }

    fn description(&self) -> &str {
        "child workflow that wakes its parent"
    }

    fn state_transitions(&self) -> HashMap<&'static str, Vec<&'static str>> {
        HashMap::from([("ChildInit", vec!["ChildDone"])])
    }

    fn all_states(&self) -> Vec<StateSpec> {
        vec![
            StateSpec::new("ChildInit", StateType::Start),
            StateSpec::new("ChildDone", StateType::End),
        ]
    }

    fn handled_states(&self) -> Vec<&'static str> {
        vec!["ChildInit"]
    }

    fn setup(&mut self, record: &WorkflowRecord) {
        self.data.setup(record);
    }

    fn state_vars(&self) -> &HashMap<String, String> {
        &self.data.state_vars
    }

    async fn handle(
        &mut self,
        state: &str,
        ctx: &WorkflowContext,
    ) -> Result<NextState, HandlerError> {
        match state {
            "ChildInit" => {
                ctx.wake_parent().await?;
                Ok(NextState::to("ChildDone"))
            }
            other => Err(HandlerError::Unhandled(other.to_string())),
        }
    }
}
