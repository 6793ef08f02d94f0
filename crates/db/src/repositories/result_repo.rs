//! Repository for the `results` table.

use sqlx::PgPool;

use analytics_core::submission::NewStepResult;
use analytics_core::types::SubmissionId;

use crate::models::submission::ResultRow;

/// Column list for `results` queries.
const COLUMNS: &str = "\
    id, submission_id, task_id, task_name, step, name, message, result_data, created_at";

pub struct ResultRepo;

impl ResultRepo {
    /// Insert one step result. The unique `(submission_id, step)` index
    /// rejects a second result for the same step.
    pub async fn insert(pool: &PgPool, new: &NewStepResult) -> Result<ResultRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO results \
                (submission_id, task_id, task_name, step, name, message, result_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ResultRow>(&query)
            .bind(new.submission_id)
            .bind(new.task_id)
            .bind(&new.task_name)
            .bind(new.step as i32)
            .bind(&new.name)
            .bind(&new.message)
            .bind(new.result_data.as_ref().map(|b| b.as_str()))
            .fetch_one(pool)
            .await
    }

    pub async fn list_by_submission(
        pool: &PgPool,
        submission_id: SubmissionId,
    ) -> Result<Vec<ResultRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM results WHERE submission_id = $1 ORDER BY step"
        );
        sqlx::query_as::<_, ResultRow>(&query)
            .bind(submission_id)
            .fetch_all(pool)
            .await
    }
}
