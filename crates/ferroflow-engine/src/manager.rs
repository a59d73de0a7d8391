// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The workflow manager: engine wiring, polling, and control-plane
//! operations.
//!
//! One manager per process owns the registry, the stores, the wakeup signal
//! and the registered executor identity. [`WorkflowManager::start`] spawns
//! the cooperating tasks (poller, repair service, heartbeat, workers) and
//! returns a handle for graceful shutdown. Multiple processes may run
//! against the same database; they coordinate exclusively through the
//! per-row `modified` compare-and-set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use ferroflow_core::workflow::WorkflowLinks;
use ferroflow_core::{
    parse_offset, ActionRecord, ActionType, Clock, CreateAndWaitRequest, CreateWorkflowRequest,
    DefinitionRecord, ExecutorRecord, SearchWorkflowRequest, UpdateStateVarRequest,
    UpdateWorkflowStateRequest, WorkflowRecord, WorkflowStatus,
};
use ferroflow_store::{
    ActionStore, DefinitionStateRow, DefinitionStore, ExecutorStore, NewAction,
    WorkflowOverviewRow, WorkflowStore,
};
use sqlx::AnyPool;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::registry::WorkflowRegistry;
use crate::repair;
use crate::worker::{worker_loop, WorkItem};

const HEARTBEAT_INTERVAL: StdDuration = StdDuration::from_secs(30);

/// Executor id recorded on actions written by control-plane operations.
const CONTROL_PLANE_EXECUTOR: i64 = 0;

/// State shared by every engine task.
pub(crate) struct EngineShared {
    pub workflows: Arc<WorkflowStore>,
    pub actions: ActionStore,
    pub executors: ExecutorStore,
    pub definitions: DefinitionStore,
    pub registry: WorkflowRegistry,
    pub clock: Arc<dyn Clock>,
    pub config: EngineConfig,
    pub wakeup: Notify,
    executor_id: AtomicI64,
}

impl EngineShared {
    /// Id of this process's executor row; 0 until registration ran.
    pub fn executor_id(&self) -> i64 {
        self.executor_id.load(Ordering::Relaxed)
    }

    /// Parent/child operations handed to workflow contexts.
    pub fn links(&self) -> Arc<dyn WorkflowLinks> {
        self.workflows.clone()
    }

    /// Append an action, logging instead of failing: the audit log must
    /// never break an engine transition.
    pub async fn save_action(&self, action: NewAction) {
        if let Err(err) = self.actions.save(&action).await {
            error!(
                workflow_id = action.workflow_id,
                error = %err,
                "failed to save workflow action"
            );
        }
    }
}

/// Handle over the spawned engine tasks.
pub struct EngineHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Subscribe to the engine's shutdown signal (used by the HTTP layer).
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Signal every task to stop and wait for them. Workers finish their
    /// current handler invocation first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("workflow engine stopped");
    }
}

/// Owns the registry, stores and engine identity for one process.
#[derive(Clone)]
pub struct WorkflowManager {
    shared: Arc<EngineShared>,
}

impl WorkflowManager {
    pub fn new(
        pool: AnyPool,
        config: EngineConfig,
        registry: WorkflowRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dialect = config.dialect;
        let shared = EngineShared {
            workflows: Arc::new(WorkflowStore::new(pool.clone(), dialect, clock.clone())),
            actions: ActionStore::new(pool.clone(), dialect, clock.clone()),
            executors: ExecutorStore::new(pool.clone(), dialect, clock.clone()),
            definitions: DefinitionStore::new(pool, dialect, clock.clone()),
            registry,
            clock,
            config,
            wakeup: Notify::new(),
            executor_id: AtomicI64::new(0),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Register this process as an executor, upsert definitions, and spawn
    /// the engine tasks.
    pub async fn start(&self) -> Result<EngineHandle> {
        let shared = &self.shared;

        let name = self.executor_name();
        let executor_id = shared.executors.save(&name).await?;
        shared.executor_id.store(executor_id, Ordering::Relaxed);
        info!(executor_id, name = %name, "registered executor");

        shared.registry.register_definitions(&shared.definitions).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue_tx, queue_rx) = mpsc::channel::<WorkItem>(shared.config.batch_size.max(1));
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(heartbeat_loop(
            shared.clone(),
            shutdown_rx.clone(),
        )));
        tasks.push(tokio::spawn(repair::repair_loop(
            shared.clone(),
            shutdown_rx.clone(),
        )));

        info!(
            workers = shared.config.executor_size,
            queue_size = shared.config.batch_size,
            "starting workflow engine"
        );
        for worker_id in 0..shared.config.executor_size {
            tasks.push(tokio::spawn(worker_loop(
                worker_id,
                shared.clone(),
                queue_rx.clone(),
                shutdown_rx.clone(),
            )));
        }

        tasks.push(tokio::spawn(poll_loop(
            shared.clone(),
            queue_tx,
            shutdown_rx,
        )));

        info!(
            poll_interval_ms = shared.config.check_db_interval.as_millis() as u64,
            "workflow engine started"
        );

        Ok(EngineHandle { shutdown_tx, tasks })
    }

    fn executor_name(&self) -> String {
        if let Some(name) = &self.shared.config.executor_name {
            return name.clone();
        }
        std::env::var("HOSTNAME").unwrap_or_else(|_| "workflow-engine".to_string())
    }

    /// Short-circuit the poll delay. Non-blocking; concurrent calls
    /// coalesce into one pending wakeup.
    pub fn wakeup(&self) {
        debug!("wakeup requested");
        self.shared.wakeup.notify_one();
    }

    // -----------------------------------------------------------------
    // Control-plane operations
    // -----------------------------------------------------------------

    /// Create a new instance. A duplicate `external_id` returns the
    /// existing instance's id without altering it.
    pub async fn create_workflow(&self, request: &CreateWorkflowRequest) -> Result<i64> {
        if request.external_id.is_empty()
            || request.executor_group.is_empty()
            || request.workflow_type.is_empty()
            || request.business_key.is_empty()
        {
            return Err(EngineError::Validation(
                "externalId, executorGroup, workflowType and businessKey are required".to_string(),
            ));
        }

        let instance = self
            .shared
            .registry
            .create(&request.workflow_type)
            .ok_or_else(|| EngineError::UnknownWorkflowType {
                name: request.workflow_type.clone(),
            })?;
        let initial_state = instance.initial_state().to_string();

        info!(
            external_id = %request.external_id,
            workflow_type = %request.workflow_type,
            "creating workflow"
        );

        if let Some(existing) = self
            .shared
            .workflows
            .find_by_external_id(&request.external_id)
            .await?
        {
            warn!(external_id = %request.external_id, "workflow already exists");
            return Ok(existing.id);
        }

        let state_vars = if request.state_vars.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&request.state_vars)?)
        };

        let now = self.shared.clock.now();
        let next_activation = if let Some(at) = request.next_activation {
            at
        } else if !request.next_activation_offset.is_empty() {
            let offset = parse_offset(&request.next_activation_offset)
                .map_err(|err| EngineError::Validation(err.to_string()))?;
            now + offset
        } else {
            now
        };

        let record = WorkflowRecord {
            id: 0,
            status: WorkflowStatus::New,
            execution_count: 0,
            retry_count: 0,
            created: now,
            modified: now,
            next_activation: Some(next_activation),
            started: None,
            executor_id: None,
            executor_group: request.executor_group.clone(),
            workflow_type: request.workflow_type.clone(),
            external_id: request.external_id.clone(),
            business_key: request.business_key.clone(),
            state: initial_state,
            state_vars,
            parent_workflow_id: None,
        };

        let id = match self.shared.workflows.save(&record).await {
            Ok(id) => id,
            Err(err) if err.is_unique_violation() => {
                // Lost a create race on the unique index; idempotent result.
                let existing = self
                    .shared
                    .workflows
                    .find_by_external_id(&request.external_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("workflow", &request.external_id))?;
                existing.id
            }
            Err(err) => return Err(err.into()),
        };

        self.wakeup();
        Ok(id)
    }

    /// Create an instance, then poll until its state is one of the awaited
    /// states or the deadline expires.
    pub async fn create_and_wait(&self, request: &CreateAndWaitRequest) -> Result<WorkflowRecord> {
        let wait = StdDuration::from_secs(request.wait_seconds.max(1));
        let check = StdDuration::from_secs(request.check_seconds.max(1));

        let id = self.create_workflow(&request.create_workflow_request).await?;

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            tokio::time::sleep(check).await;
            if let Some(workflow) = self.shared.workflows.find_by_id(id).await? {
                if request.wait_for_states.is_empty()
                    || request.wait_for_states.contains(&workflow.state)
                {
                    return Ok(workflow);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(EngineError::WaitTimeout);
            }
        }
    }

    /// Look an instance up by numeric id, falling back to external id.
    pub async fn find_workflow(&self, selector: &str) -> Result<WorkflowRecord> {
        if let Ok(id) = selector.parse::<i64>() {
            if let Some(workflow) = self.shared.workflows.find_by_id(id).await? {
                return Ok(workflow);
            }
        }
        self.shared
            .workflows
            .find_by_external_id(selector)
            .await?
            .ok_or_else(|| EngineError::not_found("workflow", selector))
    }

    pub async fn get_workflow(&self, id: i64) -> Result<WorkflowRecord> {
        self.shared
            .workflows
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("workflow", id))
    }

    pub async fn get_workflow_by_external_id(&self, external_id: &str) -> Result<WorkflowRecord> {
        self.shared
            .workflows
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| EngineError::not_found("workflow", external_id))
    }

    /// Force a state transition under the caller-observed `modified` token.
    /// Fails with [`EngineError::Conflict`] when the row moved.
    pub async fn update_workflow_state(
        &self,
        selector: &str,
        request: &UpdateWorkflowStateRequest,
    ) -> Result<()> {
        if request.state.trim().is_empty() {
            return Err(EngineError::Validation("state is required".to_string()));
        }
        let workflow = self.find_workflow(selector).await?;

        if !self
            .shared
            .workflows
            .lock_by_modified(workflow.id, workflow.modified)
            .await?
        {
            return Err(EngineError::Conflict);
        }

        self.shared
            .workflows
            .update_state(workflow.id, &request.state)
            .await?;
        self.shared
            .save_action(
                NewAction::new(
                    workflow.id,
                    CONTROL_PLANE_EXECUTOR,
                    ActionType::Log,
                    workflow.state.clone(),
                    format!("state manually changed to {}", request.state),
                )
                .with_counts(workflow.execution_count, workflow.retry_count),
            )
            .await;

        let next = request
            .next_activation
            .unwrap_or_else(|| self.shared.clock.now());
        self.shared
            .workflows
            .schedule_specific(workflow.id, next)
            .await?;

        self.wakeup();
        Ok(())
    }

    /// Merge one key into an instance's state vars.
    pub async fn update_state_var(
        &self,
        selector: &str,
        request: &UpdateStateVarRequest,
    ) -> Result<()> {
        if request.key.is_empty() {
            return Err(EngineError::Validation("key is required".to_string()));
        }
        let workflow = self.find_workflow(selector).await?;

        let mut vars: HashMap<String, String> = workflow
            .state_vars
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        vars.insert(request.key.clone(), request.value.clone());
        let serialized = serde_json::to_string(&vars)?;

        self.shared
            .workflows
            .save_state_vars_and_touch(workflow.id, &serialized)
            .await?;
        self.shared
            .save_action(
                NewAction::new(
                    workflow.id,
                    CONTROL_PLANE_EXECUTOR,
                    ActionType::Log,
                    workflow.state.clone(),
                    format!("updated state var {}", request.key),
                )
                .with_counts(workflow.execution_count, workflow.retry_count),
            )
            .await;
        Ok(())
    }

    pub async fn search_workflows(
        &self,
        request: &SearchWorkflowRequest,
    ) -> Result<Vec<WorkflowRecord>> {
        if request.limit > 1000 {
            return Err(EngineError::Validation(
                "limit cannot be greater than 1000".to_string(),
            ));
        }
        Ok(self.shared.workflows.search(request).await?)
    }

    pub async fn list_actions(&self, workflow_id: i64) -> Result<Vec<ActionRecord>> {
        Ok(self.shared.actions.find_by_workflow(workflow_id).await?)
    }

    pub async fn list_executors(&self, limit: i64) -> Result<Vec<ExecutorRecord>> {
        Ok(self.shared.executors.list_by_last_active(limit).await?)
    }

    pub async fn list_definitions(&self) -> Result<Vec<DefinitionRecord>> {
        Ok(self.shared.definitions.find_all().await?)
    }

    pub async fn get_definition(&self, name: &str) -> Result<DefinitionRecord> {
        self.shared
            .definitions
            .find_by_name(name)
            .await?
            .ok_or_else(|| EngineError::not_found("definition", name))
    }

    pub async fn overview(&self) -> Result<Vec<WorkflowOverviewRow>> {
        Ok(self.shared.workflows.overview().await?)
    }

    pub async fn definition_overview(&self, workflow_type: &str) -> Result<Vec<DefinitionStateRow>> {
        Ok(self.shared.workflows.state_overview(workflow_type).await?)
    }

    pub async fn top_executing(&self, limit: i64) -> Result<Vec<WorkflowRecord>> {
        Ok(self.shared.workflows.top_executing(limit).await?)
    }

    pub async fn next_to_execute(&self, limit: i64) -> Result<Vec<WorkflowRecord>> {
        Ok(self.shared.workflows.next_to_execute(limit).await?)
    }

    pub async fn children(&self, parent_id: i64) -> Result<Vec<WorkflowRecord>> {
        Ok(self
            .shared
            .workflows
            .find_children_by_parent(parent_id, false)
            .await?)
    }

    /// One immediate repair pass, outside the background cadence.
    pub async fn repair_now(&self) -> Result<usize> {
        repair::repair_once(&self.shared).await
    }
}

/// Heartbeat task: refresh this executor's `last_active` every 30 s.
async fn heartbeat_loop(shared: Arc<EngineShared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                let executor_id = shared.executor_id();
                match shared.executors.touch(executor_id).await {
                    Ok(()) => debug!(executor_id, "updated executor last_active"),
                    Err(err) => {
                        error!(executor_id, error = %err, "failed to update executor last_active");
                    }
                }
            }
        }
    }
}

/// Poller: on every tick or wakeup, claim due instances and feed the queue.
async fn poll_loop(
    shared: Arc<EngineShared>,
    queue: mpsc::Sender<WorkItem>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("workflow engine poller shutting down");
                    break;
                }
                continue;
            }

            _ = tokio::time::sleep(shared.config.check_db_interval) => {}
            _ = shared.wakeup.notified() => {}
        }
        poll_once(&shared, &queue).await;
    }
}

/// One poll pass: find due instances, claim each, set it up, enqueue it.
pub(crate) async fn poll_once(shared: &Arc<EngineShared>, queue: &mpsc::Sender<WorkItem>) {
    debug!("polling for claimable workflows");

    // Backpressure: a full queue means the workers are behind; claiming
    // more rows now would only hold them hostage.
    if queue.capacity() == 0 {
        warn!("workflow queue full, skipping poll");
        return;
    }

    let pending = match shared
        .workflows
        .find_pending(
            shared.config.batch_size as i64,
            &shared.config.executor_group,
        )
        .await
    {
        Ok(pending) => pending,
        Err(err) => {
            error!(error = %err, "error fetching claimable workflows");
            return;
        }
    };

    for workflow in pending {
        let executor_id = shared.executor_id();
        let claimed = match shared
            .workflows
            .claim_for_execution(workflow.id, executor_id, workflow.modified)
            .await
        {
            Ok(claimed) => claimed,
            Err(err) => {
                error!(workflow_id = workflow.id, error = %err, "error claiming workflow");
                continue;
            }
        };

        if !claimed {
            info!(
                workflow_id = workflow.id,
                business_key = %workflow.business_key,
                "unable to claim workflow, picked up by another executor"
            );
            shared
                .save_action(
                    NewAction::new(
                        workflow.id,
                        executor_id,
                        ActionType::LockFailed,
                        "LOCK_FAILED",
                        "failed to acquire a lock on the workflow",
                    )
                    .with_counts(workflow.execution_count, workflow.retry_count),
                )
                .await;
            continue;
        }

        shared
            .save_action(
                NewAction::new(
                    workflow.id,
                    executor_id,
                    ActionType::Scheduled,
                    "SCHEDULED",
                    "scheduled for execution",
                )
                .with_counts(workflow.execution_count, workflow.retry_count),
            )
            .await;

        let Some(mut instance) = shared.registry.create(&workflow.workflow_type) else {
            // The row references a type this process does not know. Leave it
            // claimed; repair frees it once the heartbeat goes stale.
            error!(
                workflow_id = workflow.id,
                workflow_type = %workflow.workflow_type,
                "workflow type not registered"
            );
            continue;
        };
        instance.setup(&workflow);

        debug!(
            workflow_id = workflow.id,
            business_key = %workflow.business_key,
            "queueing workflow for execution"
        );
        if queue
            .send(WorkItem {
                workflow: instance,
                record: workflow,
            })
            .await
            .is_err()
        {
            return;
        }
    }
}
