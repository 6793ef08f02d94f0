//! Repository for the catalog tables: `jobs`, `steps`, `tasks`, `backends`
//! and `parameters`.

use sqlx::PgPool;

use analytics_core::types::DbId;

use crate::models::catalog::{JobRow, ParameterRow, StepRow};

/// Column list for `jobs` queries.
const JOB_COLUMNS: &str = "id, name";

/// Column list for the step/task/backend join.
const STEP_COLUMNS: &str = "\
    s.id AS step_id, s.ordering, \
    t.id AS task_id, t.name AS task_name, t.executable, t.out_glob, t.timeout_secs, \
    b.id AS backend_id, b.name AS backend_name, b.root_path, b.max_concurrency";

/// Column list for `parameters` queries.
const PARAMETER_COLUMNS: &str =
    "id, task_id, rest_alias, flag, default_value, bool_valued, rule";

pub struct CatalogRepo;

impl CatalogRepo {
    /// One page of jobs ordered by id.
    pub async fn list_jobs(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY id LIMIT $1 OFFSET $2");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    pub async fn count_jobs(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn find_job_by_name(pool: &PgPool, name: &str) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE name = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_job(pool: &PgPool, id: DbId) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Steps of a job in execution order, joined with task and backend.
    pub async fn list_steps(pool: &PgPool, job_id: DbId) -> Result<Vec<StepRow>, sqlx::Error> {
        let query = format!(
            "SELECT {STEP_COLUMNS} \
             FROM steps s \
             JOIN tasks t ON t.id = s.task_id \
             JOIN backends b ON b.id = t.backend_id \
             WHERE s.job_id = $1 \
             ORDER BY s.ordering"
        );
        sqlx::query_as::<_, StepRow>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }

    /// Parameters of the given tasks in declaration order.
    pub async fn list_parameters(
        pool: &PgPool,
        task_ids: &[DbId],
    ) -> Result<Vec<ParameterRow>, sqlx::Error> {
        let query = format!(
            "SELECT {PARAMETER_COLUMNS} FROM parameters \
             WHERE task_id = ANY($1) \
             ORDER BY task_id, position, id"
        );
        sqlx::query_as::<_, ParameterRow>(&query)
            .bind(task_ids)
            .fetch_all(pool)
            .await
    }
}
