// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! State-machine interpreter.
//!
//! Runs one claimed instance until it suspends or reaches a terminal state.
//! Store failures abort the run without releasing the claim; the repair
//! service reclaims such instances after the cutoff. Handler failures are
//! values, counted against the retry budget. Programmer faults (missing
//! handler, disallowed transition) abort the run fatally with an `ERROR`
//! action.

use std::collections::{BTreeMap, HashMap};

use tracing::{error, info, warn};

use ferroflow_core::{
    ActionType, HandlerError, NextState, StateType, Workflow, WorkflowContext, WorkflowRecord,
    WorkflowStatus, END_SENTINEL,
};
use ferroflow_store::NewAction;

use crate::manager::EngineShared;

/// Run one claimed instance to suspension or completion.
pub(crate) async fn run_workflow(
    shared: &EngineShared,
    mut workflow: Box<dyn Workflow>,
    record: WorkflowRecord,
    worker_id: usize,
) {
    let id = record.id;
    let executor_id = shared.executor_id();

    info!(workflow_id = id, worker_id, "running workflow");
    if let Err(err) = shared
        .workflows
        .set_status(id, WorkflowStatus::Executing)
        .await
    {
        error!(workflow_id = id, worker_id, error = %err, "failed to mark workflow executing");
        return;
    }
    shared
        .save_action(
            NewAction::new(id, executor_id, ActionType::Executing, "EXECUTING", "EXECUTING")
                .with_counts(record.execution_count, record.retry_count),
        )
        .await;

    let mut current_state = record.state.clone();

    // The database decides where we resume; only the very first entry into
    // the initial state stamps the start time.
    if current_state == workflow.initial_state() && record.started.is_none() {
        if let Err(err) = shared.workflows.set_started_time(id).await {
            error!(workflow_id = id, worker_id, error = %err, "failed to set starting time");
            return;
        }
        shared
            .save_action(
                NewAction::new(
                    id,
                    executor_id,
                    ActionType::Starting,
                    "STARTING",
                    "starting workflow",
                )
                .with_counts(record.execution_count, record.retry_count),
            )
            .await;
    }

    let state_types: HashMap<&str, StateType> = workflow
        .all_states()
        .into_iter()
        .map(|spec| (spec.name, spec.state_type))
        .collect();
    let transitions = workflow.state_transitions();
    let retry_config = workflow.retry_config();

    let ctx = WorkflowContext::new(record.clone(), shared.clock.clone(), shared.links());
    let mut persisted_vars = parse_vars(record.state_vars.as_deref());

    loop {
        let terminal = current_state == END_SENTINEL
            || state_types
                .get(current_state.as_str())
                .is_some_and(|state_type| state_type.is_terminal());
        if terminal {
            info!(workflow_id = id, worker_id, state = %current_state, "workflow completed");
            if let Err(err) = shared
                .workflows
                .set_status(id, WorkflowStatus::Finished)
                .await
            {
                error!(workflow_id = id, worker_id, error = %err, "failed to mark workflow finished");
                return;
            }
            shared
                .save_action(
                    NewAction::new(
                        id,
                        executor_id,
                        ActionType::End,
                        current_state.clone(),
                        "workflow complete",
                    )
                    .with_counts(record.execution_count, record.retry_count),
                )
                .await;
            break;
        }

        let next = match workflow.handle(&current_state, &ctx).await {
            Ok(next) => next,
            Err(HandlerError::Unhandled(state)) => {
                // Programmer bug: the dispatch table lied at registration
                // time or the row carries an unknown state. The claim stays
                // in place for repair.
                error!(workflow_id = id, worker_id, state = %state, "no handler for state");
                shared
                    .save_action(
                        NewAction::new(
                            id,
                            executor_id,
                            ActionType::Error,
                            state.clone(),
                            format!("no handler for state '{state}'"),
                        )
                        .with_counts(record.execution_count, record.retry_count),
                    )
                    .await;
                return;
            }
            Err(HandlerError::Failed(err)) => {
                handle_failure(
                    shared,
                    workflow.as_ref(),
                    &record,
                    &current_state,
                    &retry_config,
                    &mut persisted_vars,
                    worker_id,
                    err,
                )
                .await;
                return;
            }
        };

        if next.name != END_SENTINEL {
            let allowed = transitions
                .get(current_state.as_str())
                .map(|successors| successors.iter().any(|to| *to == next.name))
                .unwrap_or(false);
            if !allowed {
                error!(
                    workflow_id = id, worker_id,
                    from = %current_state, to = %next.name,
                    "invalid state transition"
                );
                shared
                    .save_action(
                        NewAction::new(
                            id,
                            executor_id,
                            ActionType::Error,
                            "Invalid Transition",
                            format!("transition from {current_state} to {} is not allowed", next.name),
                        )
                        .with_counts(record.execution_count, record.retry_count),
                    )
                    .await;
                return;
            }
        }

        info!(workflow_id = id, worker_id, from = %current_state, to = %next.name, "transitioning state");
        shared
            .save_action(
                NewAction::new(
                    id,
                    executor_id,
                    ActionType::Transition,
                    current_state.clone(),
                    format!("From {current_state} to {}", next.name),
                )
                .with_counts(record.execution_count, record.retry_count),
            )
            .await;
        current_state = next.name.clone();

        // Also resets the retry count.
        if let Err(err) = shared.workflows.update_state(id, &current_state).await {
            error!(workflow_id = id, worker_id, error = %err, "failed to update state");
            return;
        }

        // `update_state` just bumped `modified`, so divergent vars persist
        // without a second bump.
        if vars_changed(&persisted_vars, workflow.state_vars()) {
            let serialized = serialize_vars(workflow.state_vars());
            info!(workflow_id = id, worker_id, "updating workflow variables");
            if let Err(err) = shared.workflows.save_state_vars(id, &serialized).await {
                error!(workflow_id = id, worker_id, error = %err, "failed to save workflow variables");
                return;
            }
            persisted_vars = workflow.state_vars().clone();
        }

        if !next.action_log.is_empty() {
            shared
                .save_action(
                    NewAction::new(
                        id,
                        executor_id,
                        ActionType::Log,
                        current_state.clone(),
                        next.action_log.clone(),
                    )
                    .with_counts(record.execution_count, record.retry_count),
                )
                .await;
        }

        if let Some(suspended) = suspend_if_scheduled(shared, &record, &current_state, &next, worker_id).await {
            if suspended {
                break;
            }
            return;
        }

        for child in &next.child_workflows {
            spawn_child(shared, &record, &current_state, child, worker_id).await;
        }
    }

    shared
        .save_action(
            NewAction::new(
                id,
                executor_id,
                ActionType::Finished,
                current_state.clone(),
                "run complete",
            )
            .with_counts(record.execution_count, record.retry_count),
        )
        .await;
    // Release the claim so any executor can pick the row up next.
    if let Err(err) = shared.workflows.clear_executor(id).await {
        error!(workflow_id = id, worker_id, error = %err, "failed to clear executor id");
        return;
    }
    info!(workflow_id = id, worker_id, "workflow run finished");
}

/// Apply a requested suspension, if any. Returns `Some(true)` when the run
/// suspended cleanly, `Some(false)` when a store error aborted it, `None`
/// when no suspension was requested.
async fn suspend_if_scheduled(
    shared: &EngineShared,
    record: &WorkflowRecord,
    current_state: &str,
    next: &NextState,
    worker_id: usize,
) -> Option<bool> {
    let id = record.id;
    let executor_id = shared.executor_id();

    if let Some(at) = next.next_execution {
        info!(workflow_id = id, worker_id, next_activation = %at, "setting next activation");
        if let Err(err) = shared.workflows.schedule_specific(id, at).await {
            error!(workflow_id = id, worker_id, error = %err, "failed to set next activation");
            return Some(false);
        }
        shared
            .save_action(
                NewAction::new(
                    id,
                    executor_id,
                    ActionType::ScheduleActivation,
                    current_state.to_string(),
                    at.to_rfc3339(),
                )
                .with_counts(record.execution_count, record.retry_count),
            )
            .await;
        return Some(true);
    }

    if !next.next_execution_offset.is_empty() {
        info!(workflow_id = id, worker_id, offset = %next.next_execution_offset, "setting next activation offset");
        if let Err(err) = shared
            .workflows
            .schedule_offset(id, &next.next_execution_offset)
            .await
        {
            error!(workflow_id = id, worker_id, error = %err, "failed to set next activation");
            return Some(false);
        }
        shared
            .save_action(
                NewAction::new(
                    id,
                    executor_id,
                    ActionType::ScheduleActivation,
                    current_state.to_string(),
                    next.next_execution_offset.clone(),
                )
                .with_counts(record.execution_count, record.retry_count),
            )
            .await;
        return Some(true);
    }

    None
}

async fn spawn_child(
    shared: &EngineShared,
    record: &WorkflowRecord,
    current_state: &str,
    request: &ferroflow_core::ChildWorkflowRequest,
    worker_id: usize,
) {
    let id = record.id;
    let executor_id = shared.executor_id();

    info!(
        parent_id = id, worker_id,
        workflow_type = %request.workflow_type,
        "creating child workflow"
    );

    let initial_state = if request.initial_state.is_empty() {
        match shared.registry.create(&request.workflow_type) {
            Some(instance) => instance.initial_state().to_string(),
            None => {
                error!(
                    parent_id = id, worker_id,
                    workflow_type = %request.workflow_type,
                    "child workflow type not registered"
                );
                return;
            }
        }
    } else {
        request.initial_state.clone()
    };

    match shared
        .workflows
        .create_child(id, request, &initial_state, &record.executor_group)
        .await
    {
        Ok(child) => {
            shared
                .save_action(
                    NewAction::new(
                        id,
                        executor_id,
                        ActionType::ChildCreated,
                        current_state.to_string(),
                        format!(
                            "Created child workflow ID {} of type {}",
                            child.id, request.workflow_type
                        ),
                    )
                    .with_counts(record.execution_count, record.retry_count),
                )
                .await;
        }
        Err(err) => {
            error!(parent_id = id, worker_id, error = %err, "failed to create child workflow");
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_failure(
    shared: &EngineShared,
    workflow: &dyn Workflow,
    record: &WorkflowRecord,
    current_state: &str,
    retry_config: &ferroflow_core::RetryConfig,
    persisted_vars: &mut HashMap<String, String>,
    worker_id: usize,
    failure: anyhow::Error,
) {
    let id = record.id;
    let executor_id = shared.executor_id();

    error!(workflow_id = id, worker_id, state = %current_state, error = %failure, "error executing state handler");
    shared
        .save_action(
            NewAction::new(
                id,
                executor_id,
                ActionType::Error,
                current_state.to_string(),
                failure.to_string(),
            )
            .with_counts(record.execution_count, record.retry_count),
        )
        .await;

    if record.retry_count >= retry_config.max_retries {
        error!(workflow_id = id, worker_id, retry_count = record.retry_count, "max retry count reached");
        if let Err(err) = shared.workflows.set_status(id, WorkflowStatus::Failed).await {
            error!(workflow_id = id, worker_id, error = %err, "failed to mark workflow failed");
            return;
        }
        shared
            .save_action(
                NewAction::new(
                    id,
                    executor_id,
                    ActionType::Failed,
                    current_state.to_string(),
                    format!(
                        "max retry count reached for workflow id {id}, count {}",
                        record.retry_count
                    ),
                )
                .with_counts(record.execution_count, record.retry_count),
            )
            .await;
        if let Err(err) = shared.workflows.clear_executor(id).await {
            error!(workflow_id = id, worker_id, error = %err, "failed to clear executor id");
        }
        return;
    }

    // A failing handler may still have made progress worth keeping.
    if vars_changed(persisted_vars, workflow.state_vars()) {
        let serialized = serialize_vars(workflow.state_vars());
        if let Err(err) = shared
            .workflows
            .save_state_vars_and_touch(id, &serialized)
            .await
        {
            error!(workflow_id = id, worker_id, error = %err, "failed to save workflow variables");
            return;
        }
        *persisted_vars = workflow.state_vars().clone();
    }

    let next_activation = shared.clock.now() + retry_config.sliding(record.retry_count);
    if let Err(err) = shared
        .workflows
        .increment_retry_and_schedule(id, next_activation)
        .await
    {
        error!(workflow_id = id, worker_id, error = %err, "failed to increment retry count");
        return;
    }
    warn!(workflow_id = id, worker_id, next_activation = %next_activation, "retry scheduled");
    shared
        .save_action(
            NewAction::new(
                id,
                executor_id,
                ActionType::Retry,
                current_state.to_string(),
                format!("retry at {}", next_activation.to_rfc3339()),
            )
            .with_counts(record.execution_count, record.retry_count),
        )
        .await;
}

fn parse_vars(raw: Option<&str>) -> HashMap<String, String> {
    raw.filter(|raw| !raw.is_empty() && *raw != "null")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default()
}

fn vars_changed(persisted: &HashMap<String, String>, current: &HashMap<String, String>) -> bool {
    persisted != current
}

/// Serialize with sorted keys so the persisted text is stable across runs.
fn serialize_vars(vars: &HashMap<String, String>) -> String {
    let ordered: BTreeMap<&String, &String> = vars.iter().collect();
    serde_json::to_string(&ordered).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_vars_are_sorted_and_stable() {
        let mut vars = HashMap::new();
        vars.insert("zebra".to_string(), "1".to_string());
        vars.insert("alpha".to_string(), "2".to_string());
        assert_eq!(serialize_vars(&vars), r#"{"alpha":"2","zebra":"1"}"#);
    }

    #[test]
    fn vars_comparison_ignores_key_order() {
        let persisted = parse_vars(Some(r#"{"b":"2","a":"1"}"#));
        let mut current = HashMap::new();
        current.insert("a".to_string(), "1".to_string());
        current.insert("b".to_string(), "2".to_string());
        assert!(!vars_changed(&persisted, &current));

        current.insert("c".to_string(), "3".to_string());
        assert!(vars_changed(&persisted, &current));
    }

    #[test]
    fn parse_vars_handles_absent_and_null() {
        assert!(parse_vars(None).is_empty());
        assert!(parse_vars(Some("")).is_empty());
        assert!(parse_vars(Some("null")).is_empty());
        assert!(parse_vars(Some("not json")).is_empty());
    }
}
