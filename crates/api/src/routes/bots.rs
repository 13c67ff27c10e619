use axum::routing::get;
use axum::Router;

use crate::handlers::bots;
use crate::state::AppState;

/// ```text
/// GET    /                          list_bots
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(bots::list_bots))
}
