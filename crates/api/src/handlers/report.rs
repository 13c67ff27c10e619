//! Handlers for report-scoped operations: staging a snapshot, running the
//! bots without persisting, planning, signing and finalizing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use labflow_core::finalizer::FinalizeOutcome;
use labflow_core::report::ReportSnapshot;
use labflow_core::signature::SignatureCredentials;
use labflow_core::store::ReportStore;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /reports/{report_id}/signatures`.
#[derive(Debug, Deserialize)]
pub struct CreateSignatureRequest {
    pub method: String,
    #[serde(default)]
    pub credentials: SignatureCredentials,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub report_id: String,
    pub outcome: FinalizeOutcome,
}

/// PUT /api/v1/reports/{report_id}
///
/// Stage or replace a report snapshot. The body's `id` must match the path.
pub async fn put_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    Json(report): Json<ReportSnapshot>,
) -> AppResult<impl IntoResponse> {
    if report.id != report_id {
        return Err(AppError::BadRequest(format!(
            "Report id '{}' does not match path '{report_id}'",
            report.id
        )));
    }

    state.reports.put(report.clone()).await;

    tracing::info!(user_id = %auth.actor.user_id, report_id = %report_id, "Report staged");

    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/reports/{report_id}
pub async fn get_report(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let report = state.reports.read_report(&report_id).await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/reports/{report_id}/validate
///
/// Run the bots against the stored report and return results plus the
/// fixed-up snapshot. Nothing is written back.
pub async fn validate_report(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let preview = state.engine.validate_report(&report_id).await?;
    Ok(Json(DataResponse { data: preview }))
}

/// GET /api/v1/reports/{report_id}/plan
///
/// The steps a workflow for this report would get.
pub async fn plan_report(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let steps = state.engine.plan(&report_id).await?;
    Ok(Json(DataResponse { data: steps }))
}

/// GET /api/v1/reports/{report_id}/workflow
///
/// The report's non-terminal workflow.
pub async fn get_active_workflow(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let workflow = state.engine.active_workflow_for_report(&report_id).await?;
    Ok(Json(DataResponse { data: workflow }))
}

/// POST /api/v1/reports/{report_id}/signatures
///
/// Authenticate the caller with the given method and issue a signature for
/// the report. Credentials are never echoed back or logged.
pub async fn create_signature(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
    Json(input): Json<CreateSignatureRequest>,
) -> AppResult<impl IntoResponse> {
    let signature = state
        .engine
        .create_signature(&report_id, &input.method, &input.credentials, Some(&auth.actor))
        .await?;

    tracing::info!(
        user_id = %auth.actor.user_id,
        report_id = %report_id,
        method = %signature.method,
        "Signature created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: signature })))
}

/// POST /api/v1/reports/{report_id}/finalize
///
/// Retry finalization of a report whose workflow already completed.
/// Idempotent.
pub async fn finalize_report(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.engine.finalize_report(&report_id, &auth.actor).await?;
    Ok(Json(DataResponse {
        data: FinalizeResponse { report_id, outcome },
    }))
}
