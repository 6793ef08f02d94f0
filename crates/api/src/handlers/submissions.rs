//! Handlers for the `/submissions` resource.
//!
//! Intake is validated synchronously: a rejected submission is never stored
//! or queued. Execution happens later on the worker pool, so creation only
//! reports admission, never an outcome.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use analytics_core::error::CoreError;
use analytics_core::intake::{
    self, InputData, InputUpload, SubmissionForm, FIELD_EMAIL, FIELD_INPUT_DATA, FIELD_JOB,
    FIELD_SUBMISSION_NAME,
};
use analytics_core::submission::{NewSubmission, StepResult, SubmissionStatus};
use analytics_core::types::{SubmissionId, Timestamp};
use analytics_db::{JobCatalog, ResultStore, SubmissionStore};

use crate::error::AppResult;
use crate::middleware::requester::RequesterIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

/// Filename used when the input part carries none.
const DEFAULT_INPUT_FILENAME: &str = "input";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct CreatedSubmission {
    pub uuid: SubmissionId,
    pub state: SubmissionStatus,
    pub priority: i32,
    /// Whether the requester's backlog pushed this submission to the lowest tier.
    pub demoted: bool,
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    pub task: String,
    pub name: String,
    pub message: String,
    pub step: u32,
    /// Retrieval URL of the step's output, if it produced one.
    pub result_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionDetail {
    pub submission_name: String,
    pub uuid: SubmissionId,
    pub job: String,
    pub state: SubmissionStatus,
    pub current_step: Option<u32>,
    pub last_message: Option<String>,
    pub created_at: Timestamp,
    pub results: Vec<ResultView>,
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/submissions
///
/// Accepts a multipart form with `input_data`, `job`, `submission_name`,
/// `email` and any number of `<task>_<alias>` parameter fields. Returns 201
/// with the new submission's UUID. Rejects with 400 when the form is
/// malformed, 406 when the job is unknown or parameters are missing or
/// invalid, and 503 when the queue is full.
pub async fn create_submission(
    State(state): State<AppState>,
    RequesterIdentity(requester): RequesterIdentity,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedSubmission>>)> {
    let form = read_form(&mut multipart).await?;

    let job = match form.job.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => state.store.find_job_by_name(key).await?,
        None => None,
    };
    let validated = intake::validate(&form, |_| job.as_ref())?;

    // Hold a queue slot before anything is written, so a full queue leaves
    // no trace.
    let reservation = state.queue.reserve(&requester)?;

    let id = Uuid::new_v4();
    let (input_data, uploaded) = match validated.input_data {
        InputData::Upload(upload) => {
            let blob = state
                .blobs
                .put(&format!("submissions/{id}"), &upload.filename, &upload.bytes)
                .await?;
            (blob.clone(), Some(blob))
        }
        InputData::Stored(blob) => (blob, None),
    };

    let created = state
        .store
        .create_submission(NewSubmission {
            id,
            job_id: validated.job.id,
            job_name: validated.job.name.clone(),
            submission_name: validated.submission_name,
            email: validated.email,
            input_data,
            parameters: validated.parameters,
            requester: requester.id.clone(),
            priority: reservation.admission().priority,
        })
        .await;

    let submission = match created {
        Ok(submission) => submission,
        Err(e) => {
            if let Some(blob) = uploaded {
                if let Err(cleanup) = state.blobs.delete(&blob).await {
                    tracing::warn!(blob = %blob.as_str(), error = %cleanup, "Failed to remove orphaned input");
                }
            }
            return Err(e.into());
        }
    };

    let admission = reservation.enqueue(submission.id);

    tracing::info!(
        submission_id = %submission.id,
        job = %submission.job_name,
        requester = %requester.id,
        priority = admission.priority,
        demoted = admission.demoted,
        "Submission admitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedSubmission {
                uuid: submission.id,
                state: submission.status,
                priority: admission.priority,
                demoted: admission.demoted,
            },
        }),
    ))
}

/// Collect the multipart body into a [`SubmissionForm`].
///
/// A body that cannot be read as multipart is malformed.
async fn read_form(multipart: &mut Multipart) -> Result<SubmissionForm, CoreError> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::MalformedRequest(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == FIELD_INPUT_DATA {
            let filename = field
                .file_name()
                .filter(|f| !f.trim().is_empty())
                .unwrap_or(DEFAULT_INPUT_FILENAME)
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| CoreError::MalformedRequest(e.body_text()))?;
            form.input_data = Some(InputData::Upload(InputUpload {
                filename,
                bytes: bytes.to_vec(),
            }));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| CoreError::MalformedRequest(e.body_text()))?;
        match name.as_str() {
            FIELD_JOB => form.job = Some(value),
            FIELD_SUBMISSION_NAME => form.submission_name = Some(value),
            FIELD_EMAIL => form.email = Some(value),
            _ => {
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}

// ---------------------------------------------------------------------------
// Detail
// ---------------------------------------------------------------------------

/// GET /api/v1/submissions/{id}
///
/// Current state of a submission and the results recorded so far, in step
/// order.
pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<SubmissionId>,
) -> AppResult<Json<DataResponse<SubmissionDetail>>> {
    let submission = state
        .store
        .find_submission(id)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Submission",
            id: id.to_string(),
        })?;

    let results = state
        .store
        .list_results(id)
        .await?
        .into_iter()
        .map(|r| result_view(&state, r))
        .collect();

    Ok(Json(DataResponse {
        data: SubmissionDetail {
            submission_name: submission.submission_name,
            uuid: submission.id,
            job: submission.job_name,
            state: submission.status,
            current_step: submission.current_step,
            last_message: submission.last_message,
            created_at: submission.created_at,
            results,
        },
    }))
}

fn result_view(state: &AppState, result: StepResult) -> ResultView {
    ResultView {
        task: result.task_name,
        name: result.name,
        message: result.message,
        step: result.step,
        result_data: result.result_data.as_ref().map(|b| state.blobs.url(b)),
    }
}
