//! Repository traits.
//!
//! The pipeline and API crates only see these traits, held as
//! `Arc<dyn Store>`. Submissions are mutated through
//! [`SubmissionStore::transition_status`] (compare-and-set) and
//! [`SubmissionStore::update_progress`]; results are append-only.

use async_trait::async_trait;

use analytics_core::catalog::{Job, JobSummary};
use analytics_core::submission::{
    NewStepResult, NewSubmission, StepResult, Submission, SubmissionStatus,
};
use analytics_core::types::{DbId, SubmissionId};

use crate::error::StoreError;

/// Read-only access to job reference data.
#[async_trait]
pub trait JobCatalog: Send + Sync {
    /// One page of jobs ordered by id, plus the total count.
    async fn list_jobs(&self, limit: i64, offset: i64)
        -> Result<(Vec<JobSummary>, i64), StoreError>;

    /// Fully resolved job graph by its unique name.
    async fn find_job_by_name(&self, name: &str) -> Result<Option<Job>, StoreError>;

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, StoreError>;
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist a validated submission in the `Submitted` state.
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, StoreError>;

    async fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError>;

    /// Submissions in `status`, oldest first.
    async fn list_submissions_by_status(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError>;

    /// Move `id` from `from` to `to`, recording `message` when given.
    ///
    /// Returns `false` without changing anything when the stored status is
    /// not `from`.
    async fn transition_status(
        &self,
        id: SubmissionId,
        from: SubmissionStatus,
        to: SubmissionStatus,
        message: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Record which step is executing and a progress message.
    async fn update_progress(
        &self,
        id: SubmissionId,
        current_step: u32,
        message: &str,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append a step result. A second result for the same
    /// (submission, step) is rejected with [`StoreError::DuplicateResult`].
    async fn insert_result(&self, new: NewStepResult) -> Result<StepResult, StoreError>;

    /// All results of a submission ordered by step.
    async fn list_results(&self, submission_id: SubmissionId)
        -> Result<Vec<StepResult>, StoreError>;
}

/// Everything the service needs from storage.
#[async_trait]
pub trait Store: JobCatalog + SubmissionStore + ResultStore {
    async fn health_check(&self) -> Result<(), StoreError>;
}
