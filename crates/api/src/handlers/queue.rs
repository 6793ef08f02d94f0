use axum::extract::State;
use axum::Json;

use analytics_pipeline::QueueStatus;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/queue
///
/// Current queue depth and the admission limits in force.
pub async fn queue_status(State(state): State<AppState>) -> Json<DataResponse<QueueStatus>> {
    Json(DataResponse {
        data: state.queue.status(),
    })
}
