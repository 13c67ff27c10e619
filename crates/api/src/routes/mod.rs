pub mod bots;
pub mod health;
pub mod report;
pub mod workflow;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /reports/{report_id}                             stage (PUT), get
/// /reports/{report_id}/validate                    run bots, no persistence (POST)
/// /reports/{report_id}/plan                        planned steps
/// /reports/{report_id}/workflow                    active workflow
/// /reports/{report_id}/signatures                  create signature (POST)
/// /reports/{report_id}/finalize                    retry finalization (POST)
///
/// /workflows                                       create (POST)
/// /workflows/{id}                                  get
/// /workflows/{id}/auto-validation                  run automatic step (POST)
/// /workflows/{id}/steps/{step_id}/assign           assign step (POST)
/// /workflows/{id}/steps/{step_id}/complete         complete step (POST)
/// /workflows/{id}/cancel                           cancel (POST)
///
/// /bots                                            list registered bots
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/reports", report::router())
        .nest("/workflows", workflow::router())
        .nest("/bots", bots::router())
}
