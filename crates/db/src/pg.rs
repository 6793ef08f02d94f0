//! PostgreSQL-backed [`Store`].

use async_trait::async_trait;

use analytics_core::catalog::{Job, JobSummary};
use analytics_core::submission::{
    NewStepResult, NewSubmission, StepResult, Submission, SubmissionStatus,
};
use analytics_core::types::{DbId, SubmissionId};

use crate::error::StoreError;
use crate::models::catalog::{assemble_job, JobRow};
use crate::repositories::{CatalogRepo, ResultRepo, SubmissionRepo};
use crate::store::{JobCatalog, ResultStore, Store, SubmissionStore};
use crate::DbPool;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn load_job(&self, row: JobRow) -> Result<Job, StoreError> {
        let steps = CatalogRepo::list_steps(&self.pool, row.id).await?;
        let mut task_ids: Vec<DbId> = steps.iter().map(|s| s.task_id).collect();
        task_ids.sort_unstable();
        task_ids.dedup();
        let parameters = CatalogRepo::list_parameters(&self.pool, &task_ids).await?;
        assemble_job(row, steps, parameters)
    }

    fn submission_not_found(id: SubmissionId) -> StoreError {
        StoreError::NotFound {
            entity: "submission",
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl JobCatalog for PgStore {
    async fn list_jobs(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<JobSummary>, i64), StoreError> {
        let rows = CatalogRepo::list_jobs(&self.pool, limit, offset).await?;
        let total = CatalogRepo::count_jobs(&self.pool).await?;
        Ok((rows.into_iter().map(JobSummary::from).collect(), total))
    }

    async fn find_job_by_name(&self, name: &str) -> Result<Option<Job>, StoreError> {
        match CatalogRepo::find_job_by_name(&self.pool, name).await? {
            Some(row) => self.load_job(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        match CatalogRepo::find_job(&self.pool, id).await? {
            Some(row) => self.load_job(row).await.map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, StoreError> {
        SubmissionRepo::create(&self.pool, &new).await?.try_into()
    }

    async fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError> {
        SubmissionRepo::find_by_id(&self.pool, id)
            .await?
            .map(Submission::try_from)
            .transpose()
    }

    async fn list_submissions_by_status(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError> {
        SubmissionRepo::list_by_status(&self.pool, status)
            .await?
            .into_iter()
            .map(Submission::try_from)
            .collect()
    }

    async fn transition_status(
        &self,
        id: SubmissionId,
        from: SubmissionStatus,
        to: SubmissionStatus,
        message: Option<&str>,
    ) -> Result<bool, StoreError> {
        let changed = SubmissionRepo::transition(&self.pool, id, from, to, message).await?;
        if changed > 0 {
            return Ok(true);
        }
        if SubmissionRepo::exists(&self.pool, id).await? {
            Ok(false)
        } else {
            Err(Self::submission_not_found(id))
        }
    }

    async fn update_progress(
        &self,
        id: SubmissionId,
        current_step: u32,
        message: &str,
    ) -> Result<(), StoreError> {
        let changed =
            SubmissionRepo::update_progress(&self.pool, id, current_step as i32, message).await?;
        if changed == 0 {
            return Err(Self::submission_not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ResultStore for PgStore {
    async fn insert_result(&self, new: NewStepResult) -> Result<StepResult, StoreError> {
        match ResultRepo::insert(&self.pool, &new).await {
            Ok(row) => row.try_into(),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateResult {
                    submission_id: new.submission_id,
                    step: new.step,
                })
            }
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(Self::submission_not_found(new.submission_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_results(
        &self,
        submission_id: SubmissionId,
    ) -> Result<Vec<StepResult>, StoreError> {
        ResultRepo::list_by_submission(&self.pool, submission_id)
            .await?
            .into_iter()
            .map(StepResult::try_from)
            .collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
