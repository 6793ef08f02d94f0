pub mod health;
pub mod jobs;
pub mod queue;
pub mod submissions;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /submissions                 create (multipart POST)
/// /submissions/{id}            detail
///
/// /jobs                        list (paginated)
/// /jobs/{name}                 steps and required parameter fields
///
/// /queue                       depth and admission limits
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/submissions", submissions::router())
        .nest("/jobs", jobs::router())
        .nest("/queue", queue::router())
}
