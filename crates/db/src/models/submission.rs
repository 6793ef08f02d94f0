//! Submission and result rows.

use sqlx::types::Json;
use sqlx::FromRow;

use analytics_core::blob::BlobRef;
use analytics_core::parameters::BoundParameters;
use analytics_core::submission::{StepResult, Submission, SubmissionStatus};
use analytics_core::types::{DbId, SubmissionId, Timestamp};

use crate::error::StoreError;

/// A row from the `submissions` table.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRow {
    pub id: SubmissionId,
    pub job_id: DbId,
    pub job_name: String,
    pub submission_name: String,
    pub email: String,
    pub input_data: String,
    pub parameters: Json<BoundParameters>,
    pub requester: String,
    pub priority: i32,
    pub status: i16,
    pub current_step: Option<i32>,
    pub last_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        let status = SubmissionStatus::from_id(row.status).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "Submission {} has unknown status {}",
                row.id, row.status
            ))
        })?;
        Ok(Self {
            id: row.id,
            job_id: row.job_id,
            job_name: row.job_name,
            submission_name: row.submission_name,
            email: row.email,
            input_data: BlobRef::new(row.input_data),
            parameters: row.parameters.0,
            requester: row.requester,
            priority: row.priority,
            status,
            current_step: row.current_step.and_then(|s| u32::try_from(s).ok()),
            last_message: row.last_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `results` table.
#[derive(Debug, Clone, FromRow)]
pub struct ResultRow {
    pub id: DbId,
    pub submission_id: SubmissionId,
    pub task_id: DbId,
    pub task_name: String,
    pub step: i32,
    pub name: String,
    pub message: String,
    pub result_data: Option<String>,
    pub created_at: Timestamp,
}

impl TryFrom<ResultRow> for StepResult {
    type Error = StoreError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        let step = u32::try_from(row.step).map_err(|_| {
            StoreError::Corrupt(format!("Result {} has negative step {}", row.id, row.step))
        })?;
        Ok(Self {
            id: row.id,
            submission_id: row.submission_id,
            task_id: row.task_id,
            task_name: row.task_name,
            step,
            name: row.name,
            message: row.message,
            result_data: row.result_data.map(BlobRef::new),
            created_at: row.created_at,
        })
    }
}
