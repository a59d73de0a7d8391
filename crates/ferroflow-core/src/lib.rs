// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Domain model and workflow contract for the FerroFlow engine.
//!
//! This crate is dependency-light on purpose: it holds the persistent record
//! types, the [`Workflow`](workflow::Workflow) trait user state machines
//! implement, the retry/scheduling value types, and the injectable clock.
//! The store and engine crates build on top of it.

pub mod clock;
pub mod domain;
pub mod models;
pub mod offset;
pub mod workflow;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    ActionRecord, ActionType, DefinitionRecord, ExecutorRecord, WorkflowRecord, WorkflowStatus,
};
pub use models::{
    ChildWorkflowRequest, CreateAndWaitRequest, CreateWorkflowRequest, CreateWorkflowResponse,
    NextState, RetryConfig, SearchWorkflowRequest, SearchWorkflowResponse, StateSpec, StateType,
    UpdateOkResponse, UpdateStateVarRequest, UpdateWorkflowStateRequest, END_SENTINEL,
};
pub use offset::{parse_offset, OffsetError};
pub use workflow::{HandlerError, Workflow, WorkflowContext, WorkflowData, WorkflowLinks};
