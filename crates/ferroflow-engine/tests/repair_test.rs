// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Repair service and optimistic-lock behaviour across executors.

mod common;

use chrono::Duration;

use common::{QuickWorkflow, TestContext};
use ferroflow_core::{ActionType, Clock, UpdateStateVarRequest, UpdateWorkflowStateRequest, WorkflowStatus};
use ferroflow_engine::WorkflowRegistry;

fn quick_registry() -> WorkflowRegistry {
    let mut registry = WorkflowRegistry::new();
    registry.register("Quick", || Box::new(QuickWorkflow::default()));
    registry
}

#[tokio::test]
async fn dead_executor_claim_is_repaired_and_finished_elsewhere() {
    let mut context = TestContext::new(quick_registry()).await;

    // Executor A claims the instance, then "crashes": no more heartbeats.
    let dead_executor = context.executors.save("dead-executor").await.unwrap();
    let id = context.create("stuck-1", "Quick").await;
    context.clock.advance(Duration::seconds(2));
    let row = context.reload(id).await;
    assert!(context
        .workflows
        .claim_for_execution(id, dead_executor, row.modified)
        .await
        .unwrap());

    // Inside the cutoff nothing is repaired.
    assert_eq!(context.manager.repair_now().await.unwrap(), 0);

    context.clock.advance(Duration::minutes(6));
    assert_eq!(context.manager.repair_now().await.unwrap(), 1);

    let repaired = context.reload(id).await;
    assert_eq!(repaired.status, WorkflowStatus::InProgress);
    assert!(repaired.executor_id.is_none());
    assert_eq!(repaired.retry_count, 1);
    let due_in = repaired.next_activation.unwrap() - context.clock.now();
    assert!(due_in.num_seconds() <= 0);

    let actions = context.actions.find_by_workflow(id).await.unwrap();
    let repaired_action = actions
        .iter()
        .find(|action| action.action_type == ActionType::Repaired)
        .expect("repaired action written");
    assert!(repaired_action
        .text
        .contains(&format!("previous executor was {dead_executor}")));

    // A second pass finds nothing: the row is no longer owned.
    assert_eq!(context.manager.repair_now().await.unwrap(), 0);

    // A live executor picks the repaired row up and finishes it.
    context.start().await;
    context.advance(Duration::seconds(2));
    let finished = context.wait_for_status(id, WorkflowStatus::Finished).await;
    assert_eq!(finished.state, "Done");

    context.shutdown().await;
}

#[tokio::test]
async fn live_heartbeats_shield_claims_from_repair() {
    let context = TestContext::new(quick_registry()).await;

    let live_executor = context.executors.save("live-executor").await.unwrap();
    let id = context.create("shielded", "Quick").await;
    context.clock.advance(Duration::seconds(2));
    let row = context.reload(id).await;
    assert!(context
        .workflows
        .claim_for_execution(id, live_executor, row.modified)
        .await
        .unwrap());

    context.clock.advance(Duration::minutes(6));
    // The executor heartbeats just before the repair pass.
    context.executors.touch(live_executor).await.unwrap();

    assert_eq!(context.manager.repair_now().await.unwrap(), 0);
    let untouched = context.reload(id).await;
    assert_eq!(untouched.status, WorkflowStatus::Scheduled);
    assert_eq!(untouched.executor_id, Some(live_executor));
}

#[tokio::test]
async fn stale_modified_token_loses_the_external_edit() {
    let context = TestContext::new(quick_registry()).await;

    let id = context.create("contended", "Quick").await;
    let observed = context.reload(id).await;

    // The engine advances the row after the caller read it.
    context.clock.advance(Duration::milliseconds(5));
    context.workflows.update_state(id, "Fetch").await.unwrap();

    // The caller's token is stale: no state change happens.
    assert!(!context
        .workflows
        .lock_by_modified(id, observed.modified)
        .await
        .unwrap());
    let row = context.reload(id).await;
    assert_eq!(row.state, "Fetch");
    assert_eq!(row.status, WorkflowStatus::New);
    assert_eq!(row.retry_count, 0);
}

#[tokio::test]
async fn forced_state_transition_runs_from_the_new_state() {
    let mut context = TestContext::new(quick_registry()).await;

    // Parked an hour out so only the forced edit makes it runnable.
    let id = context
        .manager
        .create_workflow(&ferroflow_core::CreateWorkflowRequest {
            external_id: "forced".to_string(),
            executor_group: "default".to_string(),
            workflow_type: "Quick".to_string(),
            business_key: "bk".to_string(),
            next_activation_offset: "1 hour".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    context
        .manager
        .update_workflow_state(
            &id.to_string(),
            &UpdateWorkflowStateRequest {
                state: "Fetch".to_string(),
                next_activation: None,
            },
        )
        .await
        .unwrap();

    let edited = context.reload(id).await;
    assert_eq!(edited.state, "Fetch");
    assert_eq!(edited.status, WorkflowStatus::InProgress);

    let actions = context.action_types(id).await;
    assert!(actions.contains(&ActionType::Log));

    // The engine resumes from the forced state: Init is never executed, so
    // the run starts directly at Fetch.
    context.start().await;
    context.advance(Duration::seconds(2));
    let finished = context.wait_for_status(id, WorkflowStatus::Finished).await;
    assert_eq!(finished.state, "Done");
    assert_eq!(
        finished.state_vars.as_deref(),
        Some(r#"{"fetched":"true"}"#)
    );

    context.shutdown().await;
}

#[tokio::test]
async fn update_state_var_merges_into_existing_vars() {
    let context = TestContext::new(quick_registry()).await;

    let id = context.create("vars-merge", "Quick").await;
    let before = context.reload(id).await;

    context.clock.advance(Duration::milliseconds(5));
    context
        .manager
        .update_state_var(
            &id.to_string(),
            &UpdateStateVarRequest {
                key: "note".to_string(),
                value: "from the control plane".to_string(),
            },
        )
        .await
        .unwrap();

    let row = context.reload(id).await;
    let vars: std::collections::HashMap<String, String> =
        serde_json::from_str(row.state_vars.as_deref().unwrap()).unwrap();
    assert_eq!(
        vars.get("note").map(String::as_str),
        Some("from the control plane")
    );
    assert!(row.modified > before.modified);
}
