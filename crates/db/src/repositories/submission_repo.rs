//! Repository for the `submissions` table.

use sqlx::types::Json;
use sqlx::PgPool;

use analytics_core::submission::{NewSubmission, SubmissionStatus};
use analytics_core::types::SubmissionId;

use crate::models::submission::SubmissionRow;

/// Column list for `submissions` queries.
const COLUMNS: &str = "\
    id, job_id, job_name, submission_name, email, input_data, parameters, \
    requester, priority, status, current_step, last_message, \
    created_at, updated_at";

pub struct SubmissionRepo;

impl SubmissionRepo {
    /// Insert a new submission in the `Submitted` state.
    pub async fn create(pool: &PgPool, new: &NewSubmission) -> Result<SubmissionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO submissions \
                (id, job_id, job_name, submission_name, email, input_data, parameters, \
                 requester, priority, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SubmissionRow>(&query)
            .bind(new.id)
            .bind(new.job_id)
            .bind(&new.job_name)
            .bind(&new.submission_name)
            .bind(&new.email)
            .bind(new.input_data.as_str())
            .bind(Json(&new.parameters))
            .bind(&new.requester)
            .bind(new.priority)
            .bind(SubmissionStatus::Submitted.id())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: SubmissionId,
    ) -> Result<Option<SubmissionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM submissions WHERE id = $1");
        sqlx::query_as::<_, SubmissionRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_status(
        pool: &PgPool,
        status: SubmissionStatus,
    ) -> Result<Vec<SubmissionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM submissions WHERE status = $1 ORDER BY created_at"
        );
        sqlx::query_as::<_, SubmissionRow>(&query)
            .bind(status.id())
            .fetch_all(pool)
            .await
    }

    /// Conditional status update. Returns the number of rows changed:
    /// zero when the submission is missing or not in `from`.
    pub async fn transition(
        pool: &PgPool,
        id: SubmissionId,
        from: SubmissionStatus,
        to: SubmissionStatus,
        message: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE submissions \
             SET status = $3, last_message = COALESCE($4, last_message), updated_at = NOW() \
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from.id())
        .bind(to.id())
        .bind(message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn exists(pool: &PgPool, id: SubmissionId) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM submissions WHERE id = $1)")
                .bind(id)
                .fetch_one(pool)
                .await?;
        Ok(exists)
    }

    /// Record the executing step and a progress message.
    pub async fn update_progress(
        pool: &PgPool,
        id: SubmissionId,
        current_step: i32,
        message: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE submissions \
             SET current_step = $2, last_message = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(current_step)
        .bind(message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
