// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Workflow type registry.
//!
//! Maps type names to factories producing fresh [`Workflow`] values, checks
//! every declaration at registration time, and upserts the definition rows
//! (description plus rendered flow chart) at engine startup.

use std::collections::{HashMap, HashSet};

use tracing::info;

use ferroflow_core::{StateType, Workflow, END_SENTINEL};
use ferroflow_store::DefinitionStore;

use crate::error::Result;

/// Produces a fresh workflow instance per invocation.
pub type WorkflowFactory = Box<dyn Fn() -> Box<dyn Workflow> + Send + Sync>;

/// Declaration faults detected at registration time.
///
/// These are programmer errors in a workflow definition; surfacing them as
/// typed values (instead of aborting) lets embedding applications decide how
/// to fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("workflow '{workflow}': initial state '{state}' is not declared")]
    UndeclaredInitialState { workflow: String, state: String },

    #[error("workflow '{workflow}': initial state '{state}' must have type Start")]
    InitialStateNotStart { workflow: String, state: String },

    #[error("workflow '{workflow}': state '{state}' has no handler")]
    MissingHandler { workflow: String, state: String },

    #[error("workflow '{workflow}': transition {from} -> {to} references an undeclared state")]
    UndeclaredTransition {
        workflow: String,
        from: String,
        to: String,
    },
}

/// Process-wide mapping from workflow type name to factory.
#[derive(Default)]
pub struct WorkflowRegistry {
    factories: HashMap<String, WorkflowFactory>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`. The last registration wins.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Workflow> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Fresh instance of the named type.
    pub fn create(&self, name: &str) -> Option<Box<dyn Workflow>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate every registered type's declarations.
    pub fn validate(&self) -> std::result::Result<(), RegistryError> {
        for name in self.names() {
            let instance = self.factories[name]();
            validate_workflow(name, instance.as_ref())?;
        }
        Ok(())
    }

    /// Validate all types and upsert their definition rows.
    pub async fn register_definitions(&self, definitions: &DefinitionStore) -> Result<()> {
        for name in self.names() {
            let instance = self.factories[name]();
            validate_workflow(name, instance.as_ref())?;
            let chart = flow_chart(instance.as_ref());
            info!(name, "saving workflow definition");
            definitions
                .upsert(name, instance.description(), &chart)
                .await?;
        }
        Ok(())
    }
}

fn validate_workflow(name: &str, workflow: &dyn Workflow) -> std::result::Result<(), RegistryError> {
    let states = workflow.all_states();
    let declared: HashMap<&str, StateType> = states
        .iter()
        .map(|spec| (spec.name, spec.state_type))
        .collect();
    let handled: HashSet<&str> = workflow.handled_states().into_iter().collect();

    let initial = workflow.initial_state();
    match declared.get(initial) {
        None => {
            return Err(RegistryError::UndeclaredInitialState {
                workflow: name.to_string(),
                state: initial.to_string(),
            })
        }
        Some(StateType::Start) => {}
        Some(_) => {
            return Err(RegistryError::InitialStateNotStart {
                workflow: name.to_string(),
                state: initial.to_string(),
            })
        }
    }

    for spec in &states {
        let needs_handler = matches!(spec.state_type, StateType::Start | StateType::Normal);
        if needs_handler && !handled.contains(spec.name) {
            return Err(RegistryError::MissingHandler {
                workflow: name.to_string(),
                state: spec.name.to_string(),
            });
        }
    }

    for (from, successors) in workflow.state_transitions() {
        if !declared.contains_key(from) {
            return Err(RegistryError::UndeclaredTransition {
                workflow: name.to_string(),
                from: from.to_string(),
                to: String::new(),
            });
        }
        for to in successors {
            if to != END_SENTINEL && !declared.contains_key(to) {
                return Err(RegistryError::UndeclaredTransition {
                    workflow: name.to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Render the declared state machine as a Mermaid flow chart, with style
/// classes per state type. Output is deterministic: edges and class
/// assignments are emitted in sorted order.
pub fn flow_chart(workflow: &dyn Workflow) -> String {
    const ERROR_CLASS: &str = "fill:#FF6B6B,stroke:#C53030,stroke-width:2px,color:#fff,stroke-dasharray: 4 2,rx:10,ry:10;";
    const DONE_CLASS: &str = "fill:#4ECDC4,stroke:#1F9C8C,stroke-width:2px,color:#fff,stroke-dasharray: 4 2,rx:10,ry:10;";
    const START_CLASS: &str = "fill:#5568FE,stroke:#3346FF,stroke-width:2px,color:#fff,stroke-dasharray: 4 2,rx:10,ry:10;";
    const MANUAL_CLASS: &str = "fill:#FFD93D,stroke:#E6C200,stroke-width:2px,color:#333,stroke-dasharray: 4 2,rx:10,ry:10;";
    const NORMAL_CLASS: &str = "fill:#F0F4F8,stroke:#B0C4DE,stroke-width:1px,color:#333,rx:10,ry:10;";

    let mut chart = String::from("flowchart TD\n");

    let mut edges: Vec<(&str, &str)> = workflow
        .state_transitions()
        .into_iter()
        .flat_map(|(from, tos)| tos.into_iter().map(move |to| (from, to)))
        .collect();
    edges.sort_unstable();
    for (from, to) in edges {
        chart.push_str(&format!("    {from} --> {to}\n"));
    }

    chart.push_str(&format!("    classDef errorClass {ERROR_CLASS}\n"));
    chart.push_str(&format!("    classDef doneClass {DONE_CLASS}\n"));
    chart.push_str(&format!("    classDef startClass {START_CLASS}\n"));
    chart.push_str(&format!("    classDef manualClass {MANUAL_CLASS}\n"));
    chart.push_str(&format!("    classDef normalClass {NORMAL_CLASS}\n"));

    let mut states = workflow.all_states();
    states.sort_unstable_by_key(|spec| spec.name);
    for spec in states {
        let class = match spec.state_type {
            StateType::Start => "startClass",
            StateType::End => "doneClass",
            StateType::Manual => "manualClass",
            StateType::Error => "errorClass",
            StateType::Normal => "normalClass",
        };
        chart.push_str(&format!("    class {} {class};\n", spec.name));
    }

    chart
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferroflow_core::{
        HandlerError, NextState, StateSpec, WorkflowContext, WorkflowData, WorkflowRecord,
    };

    struct TwoStep {
        data: WorkflowData,
        missing_handler: bool,
        bad_initial: bool,
    }

    impl TwoStep {
        fn good() -> Self {
            Self {
                data: WorkflowData::default(),
                missing_handler: false,
                bad_initial: false,
            }
        }
    }

    #[async_trait]
    impl Workflow for TwoStep {
        fn initial_state(&self) -> &str {
            if self.bad_initial {
                "Missing"
            } else {
                "Init"
            }
        }

        fn description(&self) -> &str {
            "two step test workflow"
        }

        fn state_transitions(&self) -> HashMap<&'static str, Vec<&'static str>> {
            HashMap::from([("Init", vec!["Work"]), ("Work", vec!["Done"])])
        }

        fn all_states(&self) -> Vec<StateSpec> {
            vec![
                StateSpec::new("Init", StateType::Start),
                StateSpec::new("Work", StateType::Normal),
                StateSpec::new("Done", StateType::End),
            ]
        }

        fn handled_states(&self) -> Vec<&'static str> {
            if self.missing_handler {
                vec!["Init"]
            } else {
                vec!["Init", "Work"]
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
        ) -> std::result::Result<NextState, HandlerError> {
            match state {
                "Init" => Ok(NextState::to("Work")),
                "Work" => Ok(NextState::to("Done")),
                other => Err(HandlerError::Unhandled(other.to_string())),
            }
        }
    }

    #[test]
    fn valid_workflow_passes() {
        let mut registry = WorkflowRegistry::new();
        registry.register("TwoStep", || Box::new(TwoStep::good()));
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn missing_handler_is_rejected() {
        let mut registry = WorkflowRegistry::new();
        registry.register("TwoStep", || {
            Box::new(TwoStep {
                missing_handler: true,
                ..TwoStep::good()
            })
        });
        let err = registry.validate().unwrap_err();
        assert_eq!(
            err,
            RegistryError::MissingHandler {
                workflow: "TwoStep".into(),
                state: "Work".into(),
            }
        );
    }

    #[test]
    fn undeclared_initial_state_is_rejected() {
        let mut registry = WorkflowRegistry::new();
        registry.register("TwoStep", || {
            Box::new(TwoStep {
                bad_initial: true,
                ..TwoStep::good()
            })
        });
        let err = registry.validate().unwrap_err();
        assert!(matches!(err, RegistryError::UndeclaredInitialState { .. }));
    }

    #[test]
    fn flow_chart_is_deterministic_and_styled() {
        let workflow = TwoStep::good();
        let chart = flow_chart(&workflow);
        assert!(chart.starts_with("flowchart TD\n"));
        assert!(chart.contains("    Init --> Work\n"));
        assert!(chart.contains("    Work --> Done\n"));
        assert!(chart.contains("    class Init startClass;\n"));
        assert!(chart.contains("    class Done doneClass;\n"));
        assert_eq!(chart, flow_chart(&TwoStep::good()));
    }

    #[test]
    fn create_returns_fresh_instances() {
        let mut registry = WorkflowRegistry::new();
        registry.register("TwoStep", || Box::new(TwoStep::good()));
        assert!(registry.create("TwoStep").is_some());
        assert!(registry.create("Unknown").is_none());
        assert!(registry.contains("TwoStep"));
        assert_eq!(registry.names(), vec!["TwoStep"]);
    }
}
