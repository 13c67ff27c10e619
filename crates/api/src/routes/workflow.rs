//! Route definitions for validation workflows, nested under `/workflows`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workflow;
use crate::state::AppState;

/// ```text
/// POST   /                                  create_workflow
/// GET    /{id}                              get_workflow
/// POST   /{id}/auto-validation              run_auto_validation
/// POST   /{id}/steps/{step_id}/assign       assign_step
/// POST   /{id}/steps/{step_id}/complete     complete_step
/// POST   /{id}/cancel                       cancel_workflow
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(workflow::create_workflow))
        .route("/{id}", get(workflow::get_workflow))
        .route("/{id}/auto-validation", post(workflow::run_auto_validation))
        .route("/{id}/steps/{step_id}/assign", post(workflow::assign_step))
        .route(
            "/{id}/steps/{step_id}/complete",
            post(workflow::complete_step),
        )
        .route("/{id}/cancel", post(workflow::cancel_workflow))
}
