//! Handlers for validation workflows.
//!
//! Provides endpoints to create a workflow, run its automatic step, assign
//! and complete manual steps, and cancel it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use labflow_core::signature::DigitalSignature;
use labflow_core::types::WorkflowId;
use labflow_core::workflow::{CompleteStep, StepOutcome, WorkflowPriority};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    pub report_id: String,
    /// `routine` (default), `urgent` or `stat`.
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignStepRequest {
    pub assignee_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStepRequest {
    /// `completed` or `failed`.
    pub outcome: String,
    pub notes: Option<String>,
    pub signature: Option<DigitalSignature>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelWorkflowRequest {
    pub reason: Option<String>,
}

/// POST /api/v1/workflows
pub async fn create_workflow(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateWorkflowRequest>,
) -> AppResult<impl IntoResponse> {
    let priority = match input.priority.as_deref() {
        Some(raw) => raw.parse::<WorkflowPriority>()?,
        None => WorkflowPriority::default(),
    };

    let workflow = state
        .engine
        .create_workflow(&input.report_id, priority, &auth.actor)
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: workflow })))
}

/// GET /api/v1/workflows/{id}
pub async fn get_workflow(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<WorkflowId>,
) -> AppResult<impl IntoResponse> {
    let workflow = state.engine.get_workflow(id).await?;
    Ok(Json(DataResponse { data: workflow }))
}

/// POST /api/v1/workflows/{id}/auto-validation
///
/// Run the bots for the workflow's automatic step and advance it.
pub async fn run_auto_validation(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<WorkflowId>,
) -> AppResult<impl IntoResponse> {
    let result = state.engine.run_auto_validation(id).await?;

    tracing::info!(
        user_id = %auth.actor.user_id,
        workflow_id = %id,
        errors = result.run.summary.error_count,
        "Automatic validation run"
    );

    Ok(Json(DataResponse { data: result }))
}

/// POST /api/v1/workflows/{id}/steps/{step_id}/assign
pub async fn assign_step(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, step_id)): Path<(WorkflowId, String)>,
    Json(input): Json<AssignStepRequest>,
) -> AppResult<impl IntoResponse> {
    let workflow = state
        .engine
        .assign_step(id, &step_id, &input.assignee_id, &auth.actor)
        .await?;
    Ok(Json(DataResponse { data: workflow }))
}

/// POST /api/v1/workflows/{id}/steps/{step_id}/complete
///
/// Record the caller's outcome for the current step. Completing the last
/// step finalizes the report.
pub async fn complete_step(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((id, step_id)): Path<(WorkflowId, String)>,
    Json(input): Json<CompleteStepRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome: StepOutcome = input.outcome.parse()?;
    let request = CompleteStep {
        outcome,
        notes: input.notes,
        signature: input.signature,
    };

    let workflow = state
        .engine
        .complete_step(id, &step_id, request, &auth.actor)
        .await?;
    Ok(Json(DataResponse { data: workflow }))
}

/// POST /api/v1/workflows/{id}/cancel
pub async fn cancel_workflow(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<WorkflowId>,
    Json(input): Json<CancelWorkflowRequest>,
) -> AppResult<impl IntoResponse> {
    let workflow = state
        .engine
        .cancel_workflow(id, input.reason, &auth.actor)
        .await?;
    Ok(Json(DataResponse { data: workflow }))
}
