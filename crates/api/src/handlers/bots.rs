use axum::extract::State;
use axum::Json;

use labflow_core::validation::bots::Bot;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/bots
///
/// The registered bots in execution order.
pub async fn list_bots(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Bot>>>> {
    Ok(Json(DataResponse {
        data: state.engine.bots().to_vec(),
    }))
}
