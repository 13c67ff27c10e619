//! Route definitions for report-scoped operations, nested under `/reports`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::report;
use crate::state::AppState;

/// ```text
/// PUT    /{report_id}               put_report
/// GET    /{report_id}               get_report
/// POST   /{report_id}/validate      validate_report
/// GET    /{report_id}/plan          plan_report
/// GET    /{report_id}/workflow      get_active_workflow
/// POST   /{report_id}/signatures    create_signature
/// POST   /{report_id}/finalize      finalize_report
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{report_id}",
            get(report::get_report).put(report::put_report),
        )
        .route("/{report_id}/validate", post(report::validate_report))
        .route("/{report_id}/plan", get(report::plan_report))
        .route("/{report_id}/workflow", get(report::get_active_workflow))
        .route("/{report_id}/signatures", post(report::create_signature))
        .route("/{report_id}/finalize", post(report::finalize_report))
}
