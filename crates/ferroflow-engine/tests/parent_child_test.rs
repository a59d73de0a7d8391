// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parent/child coordination through the shared store.

mod common;

use chrono::Duration;

use common::{ParentWorkflow, TestContext, WakingChildWorkflow};
use ferroflow_core::{ActionType, WorkflowStatus};
use ferroflow_engine::WorkflowRegistry;

fn family_registry() -> WorkflowRegistry {
    let mut registry = WorkflowRegistry::new();
    registry.register("Parent", || Box::new(ParentWorkflow::default()));
    registry.register("WakingChild", || Box::new(WakingChildWorkflow::default()));
    registry
}

#[tokio::test]
async fn parent_spawns_children_and_finishes_after_them() {
    let context = TestContext::started(family_registry()).await;

    let parent_id = context.create("family-1", "Parent").await;
    context.advance(Duration::seconds(2));

    // Let the family run; each round makes any pending activation due.
    let mut finished_parent = None;
    for _ in 0..40 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let parent = context.reload(parent_id).await;
        if parent.status == WorkflowStatus::Finished {
            finished_parent = Some(parent);
            break;
        }
        context.advance(Duration::minutes(11));
    }
    let parent = finished_parent.expect("parent should finish once children complete");
    assert_eq!(parent.state, "ParentDone");

    let children = context.manager.children(parent_id).await.unwrap();
    assert_eq!(children.len(), 2);
    for child in &children {
        assert_eq!(child.status, WorkflowStatus::Finished);
        assert_eq!(child.parent_workflow_id, Some(parent_id));
        assert_eq!(child.workflow_type, "WakingChild");
        assert!(child
            .external_id
            .starts_with(&format!("child-{parent_id}-")));
    }

    let parent_actions = context.action_types(parent_id).await;
    let spawned = parent_actions
        .iter()
        .filter(|action| **action == ActionType::ChildCreated)
        .count();
    assert_eq!(spawned, 2);
    assert!(parent_actions.contains(&ActionType::ScheduleActivation));

    context.shutdown().await;
}

#[tokio::test]
async fn children_inherit_group_and_initial_state_vars() {
    let context = TestContext::started(family_registry()).await;

    let parent_id = context.create("family-2", "Parent").await;
    context.advance(Duration::seconds(2));

    context
        .wait_for(parent_id, "parent suspended in WaitChildren", |workflow| {
            workflow.state == "WaitChildren" && workflow.status == WorkflowStatus::InProgress
        })
        .await;

    let children = context.manager.children(parent_id).await.unwrap();
    assert_eq!(children.len(), 2);
    let mut labels: Vec<String> = children
        .iter()
        .map(|child| {
            let vars: std::collections::HashMap<String, String> =
                serde_json::from_str(child.state_vars.as_deref().unwrap()).unwrap();
            vars.get("label").cloned().unwrap()
        })
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["one".to_string(), "two".to_string()]);
    for child in &children {
        assert_eq!(child.executor_group, "default");
        assert_eq!(child.state, "ChildInit");
    }

    context.shutdown().await;
}
