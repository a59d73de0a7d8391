// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP control plane.
//!
//! A thin axum layer over the [`WorkflowManager`] operations. Rendering,
//! sessions and authentication live outside the engine; this surface is the
//! JSON API external tooling automates against.

use std::future::IntoFuture;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use ferroflow_core::{
    ActionRecord, CreateAndWaitRequest, CreateWorkflowRequest, CreateWorkflowResponse,
    DefinitionRecord, ExecutorRecord, SearchWorkflowRequest, SearchWorkflowResponse,
    UpdateOkResponse, UpdateStateVarRequest, UpdateWorkflowStateRequest, WorkflowRecord,
};

use crate::error::EngineError;
use crate::manager::WorkflowManager;

const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);
const EXECUTOR_LIST_LIMIT: i64 = 50;

struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound { .. } | EngineError::UnknownWorkflowType { .. } => {
                StatusCode::NOT_FOUND
            }
            EngineError::Conflict => StatusCode::CONFLICT,
            EngineError::WaitTimeout => StatusCode::GATEWAY_TIMEOUT,
            _ => {
                error!(error = %self.0, "control plane request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Build the control-plane router over a manager.
pub fn router(manager: WorkflowManager) -> Router {
    Router::new()
        .route("/api/workflows", post(create_workflow))
        .route("/api/workflows/create-and-wait", post(create_and_wait))
        .route("/api/workflows/search", post(search_workflows))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/workflows/external/{external_id}", get(get_by_external_id))
        .route("/api/workflows/{id}/state", put(update_state))
        .route("/api/workflows/{id}/state-vars", put(update_state_var))
        .route("/api/workflows/{id}/actions", get(list_actions))
        .route("/api/definitions", get(list_definitions))
        .route("/api/definitions/{name}", get(get_definition))
        .route("/api/executors", get(list_executors))
        .with_state(manager)
}

/// Serve the control plane until the shutdown signal fires, then drain
/// connections for at most five seconds.
pub async fn serve(
    manager: WorkflowManager,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(addr = %listener.local_addr()?, "control plane listening");

    let app = router(manager);
    let mut drain_signal = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = drain_signal.changed().await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result,
        _ = async {
            let _ = shutdown.changed().await;
            tokio::time::sleep(SHUTDOWN_DRAIN).await;
        } => {
            info!("control plane drain window elapsed");
            Ok(())
        }
    }
}

async fn create_workflow(
    State(manager): State<WorkflowManager>,
    Json(request): Json<CreateWorkflowRequest>,
) -> ApiResult<CreateWorkflowResponse> {
    let id = manager.create_workflow(&request).await?;
    Ok(Json(CreateWorkflowResponse { id }))
}

async fn create_and_wait(
    State(manager): State<WorkflowManager>,
    Json(request): Json<CreateAndWaitRequest>,
) -> ApiResult<WorkflowRecord> {
    let workflow = manager.create_and_wait(&request).await?;
    Ok(Json(workflow))
}

async fn search_workflows(
    State(manager): State<WorkflowManager>,
    Json(request): Json<SearchWorkflowRequest>,
) -> ApiResult<SearchWorkflowResponse> {
    let workflows = manager.search_workflows(&request).await?;
    Ok(Json(SearchWorkflowResponse {
        results: workflows.len(),
        offset: request.offset,
        workflows,
    }))
}

async fn get_workflow(
    State(manager): State<WorkflowManager>,
    Path(id): Path<String>,
) -> ApiResult<WorkflowRecord> {
    Ok(Json(manager.find_workflow(&id).await?))
}

async fn get_by_external_id(
    State(manager): State<WorkflowManager>,
    Path(external_id): Path<String>,
) -> ApiResult<WorkflowRecord> {
    Ok(Json(manager.get_workflow_by_external_id(&external_id).await?))
}

async fn update_state(
    State(manager): State<WorkflowManager>,
    Path(id): Path<String>,
    Json(request): Json<UpdateWorkflowStateRequest>,
) -> ApiResult<UpdateOkResponse> {
    manager.update_workflow_state(&id, &request).await?;
    Ok(Json(UpdateOkResponse { ok: true }))
}

async fn update_state_var(
    State(manager): State<WorkflowManager>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStateVarRequest>,
) -> ApiResult<UpdateOkResponse> {
    manager.update_state_var(&id, &request).await?;
    Ok(Json(UpdateOkResponse { ok: true }))
}

async fn list_actions(
    State(manager): State<WorkflowManager>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ActionRecord>> {
    let workflow = manager.find_workflow(&id).await?;
    Ok(Json(manager.list_actions(workflow.id).await?))
}

async fn list_definitions(
    State(manager): State<WorkflowManager>,
) -> ApiResult<Vec<DefinitionRecord>> {
    Ok(Json(manager.list_definitions().await?))
}

async fn get_definition(
    State(manager): State<WorkflowManager>,
    Path(name): Path<String>,
) -> ApiResult<DefinitionRecord> {
    Ok(Json(manager.get_definition(&name).await?))
}

async fn list_executors(
    State(manager): State<WorkflowManager>,
) -> ApiResult<Vec<ExecutorRecord>> {
    Ok(Json(manager.list_executors(EXECUTOR_LIST_LIMIT).await?))
}
