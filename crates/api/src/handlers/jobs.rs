//! Handlers for the `/jobs` catalog.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use analytics_core::catalog::JobSummary;
use analytics_core::error::CoreError;
use analytics_core::parameters;
use analytics_core::types::DbId;
use analytics_db::JobCatalog;

use crate::error::AppResult;
use crate::query::PaginationParams;
use crate::response::{DataResponse, Page};
use crate::state::AppState;

/// What a client needs to submit against a job.
#[derive(Debug, Serialize)]
pub struct JobDetail {
    pub id: DbId,
    pub name: String,
    /// Task names in execution order.
    pub steps: Vec<String>,
    /// Form field names that must be bound, as `<task>_<alias>`.
    pub parameters: Vec<String>,
}

/// GET /api/v1/jobs
///
/// Paginated list of known jobs as `{id, name}` pairs, ordered by id.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Page<JobSummary>>>> {
    let (limit, offset) = (params.limit(), params.offset());
    let (items, total) = state.store.list_jobs(limit, offset).await?;
    Ok(Json(DataResponse {
        data: Page {
            items,
            total,
            limit,
            offset,
        },
    }))
}

/// GET /api/v1/jobs/{name}
///
/// A job's steps and the parameter fields a submission must bind.
pub async fn get_job(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<DataResponse<JobDetail>>> {
    let job = state
        .store
        .find_job_by_name(&name)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Job",
            id: name.clone(),
        })?;

    let parameters = parameters::required_parameters(&job)
        .into_iter()
        .map(|key| key.field_name())
        .collect();
    let steps = job
        .ordered_steps()
        .into_iter()
        .map(|s| s.task.name.clone())
        .collect();

    Ok(Json(DataResponse {
        data: JobDetail {
            id: job.id,
            name: job.name,
            steps,
            parameters,
        },
    }))
}
