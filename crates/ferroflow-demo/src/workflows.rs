// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Demo workflows registered by the example binary.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use ferroflow_core::{
    ChildWorkflowRequest, HandlerError, NextState, RetryConfig, StateSpec, StateType, Workflow,
    WorkflowContext, WorkflowData, WorkflowRecord, WorkflowStatus,
};

/// Fetches the caller's public IP and stores it in the state vars.
///
/// `Init(Start) -> Fetch(Normal) -> Done(End)`
#[derive(Default)]
pub struct GetIpWorkflow {
    data: WorkflowData,
}

#[async_trait]
impl Workflow for GetIpWorkflow {
    fn initial_state(&self) -> &str {
        "Init"
    }

    fn description(&self) -> &str {
        "Fetches the public IP of this host and records it"
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
            min_interval: chrono::Duration::seconds(1),
            max_interval: chrono::Duration::seconds(30),
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
        ctx: &WorkflowContext,
    ) -> Result<NextState, HandlerError> {
        match state {
            "Init" => {
                info!(workflow_id = ctx.workflow_id(), "starting ip lookup");
                Ok(NextState::to("Fetch").with_log("ip lookup started"))
            }
            "Fetch" => {
                let ip = reqwest::get("https://api.ipify.org")
                    .await
                    .context("requesting public ip")?
                    .text()
                    .await
                    .context("reading public ip response")?;
                self.data.set("ip", ip.trim());
                Ok(NextState::to("Done").with_log(format!("public ip is {}", ip.trim())))
            }
            other => Err(HandlerError::Unhandled(other.to_string())),
        }
    }
}

/// Spawns two children, suspends, and finishes once both completed.
///
/// `ParentInit(Start) -> SpawnChildren(Normal) -> WaitForChildren(Normal)
/// -> ParentDone(End)`; `WaitForChildren` loops onto itself while any
/// child is still running.
#[derive(Default)]
pub struct DemoParentWorkflow {
    data: WorkflowData,
}

#[async_trait]
impl Workflow for DemoParentWorkflow {
    fn initial_state(&self) -> &str {
        "ParentInit"
    }

    fn description(&self) -> &str {
        "Spawns child workflows and waits for them to complete"
    }

    fn state_transitions(&self) -> HashMap<&'static str, Vec<&'static str>> {
        HashMap::from([
            ("ParentInit", vec!["SpawnChildren"]),
            ("SpawnChildren", vec!["WaitForChildren"]),
            ("WaitForChildren", vec!["WaitForChildren", "ParentDone"]),
        ])
    }

    fn all_states(&self) -> Vec<StateSpec> {
        vec![
            StateSpec::new("ParentInit", StateType::Start),
            StateSpec::new("SpawnChildren", StateType::Normal),
            StateSpec::new("WaitForChildren", StateType::Normal),
            StateSpec::new("ParentDone", StateType::End),
        ]
    }

    fn handled_states(&self) -> Vec<&'static str> {
        vec!["ParentInit", "SpawnChildren", "WaitForChildren"]
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
            "ParentInit" => Ok(NextState::to("SpawnChildren").with_log("parent initialized")),
            "SpawnChildren" => {
                let children = vec![
                    ChildWorkflowRequest {
                        workflow_type: "DemoChild".to_string(),
                        business_key: format!("child-1-of-{}", ctx.workflow_id()),
                        initial_state: String::new(),
                        state_vars: HashMap::from([("label".to_string(), "first".to_string())]),
                    },
                    ChildWorkflowRequest {
                        workflow_type: "DemoChild".to_string(),
                        business_key: format!("child-2-of-{}", ctx.workflow_id()),
                        initial_state: String::new(),
                        state_vars: HashMap::from([("label".to_string(), "second".to_string())]),
                    },
                ];
                self.data.set("children_count", children.len().to_string());
                let mut next = NextState::to("WaitForChildren")
                    .with_log(format!("spawned {} child workflows", children.len()));
                next.child_workflows = children;
                Ok(next)
            }
            "WaitForChildren" => {
                let children = ctx.children(false).await?;
                let expected: usize = self
                    .data
                    .get("children_count")
                    .and_then(|count| count.parse().ok())
                    .unwrap_or(2);
                let finished = children
                    .iter()
                    .filter(|child| child.status == WorkflowStatus::Finished)
                    .count();
                if finished < expected {
                    info!(
                        workflow_id = ctx.workflow_id(),
                        finished, expected, "children still running"
                    );
                    return Ok(NextState::to("WaitForChildren")
                        .with_log(format!("waiting for children: {finished}/{expected} complete"))
                        .with_next_execution_offset("10 minutes"));
                }
                Ok(NextState::to("ParentDone").with_log("all child workflows complete"))
            }
            other => Err(HandlerError::Unhandled(other.to_string())),
        }
    }
}

/// Minimal child: records its label, then wakes the parent on completion.
///
/// `ChildInit(Start) -> ChildWork(Normal) -> ChildDone(End)`
#[derive(Default)]
pub struct DemoChildWorkflow {
    data: WorkflowData,
}

#[async_trait]
impl Workflow for DemoChildWorkflow {
    fn initial_state(&self) -> &str {
        "ChildInit"
    }

    fn description(&self) -> &str {
        "Child workflow that wakes its parent when done"
    }

    fn state_transitions(&self) -> HashMap<&'static str, Vec<&'static str>> {
        HashMap::from([
            ("ChildInit", vec!["ChildWork"]),
            ("ChildWork", vec!["ChildDone"]),
        ])
    }

    fn all_states(&self) -> Vec<StateSpec> {
        vec![
            StateSpec::new("ChildInit", StateType::Start),
            StateSpec::new("ChildWork", StateType::Normal),
            StateSpec::new("ChildDone", StateType::End),
        ]
    }

    fn handled_states(&self) -> Vec<&'static str> {
        vec!["ChildInit", "ChildWork"]
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
            "ChildInit" => Ok(NextState::to("ChildWork")),
            "ChildWork" => {
                let label = self.data.get("label").unwrap_or("unnamed").to_string();
                self.data.set("result", format!("{label} done"));
                // The parent is suspended on a long offset; waking it makes
                // it re-check its children promptly.
                ctx.wake_parent().await?;
                Ok(NextState::to("ChildDone").with_log(format!("child {label} finished")))
            }
            other => Err(HandlerError::Unhandled(other.to_string())),
        }
    }
}
