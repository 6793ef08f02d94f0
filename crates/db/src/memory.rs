//! In-process [`Store`] backed by `tokio::sync::RwLock`.
//!
//! Used when no `DATABASE_URL` is configured and throughout the test suites.
//! The catalog is fixed at construction; submissions and results live for
//! the lifetime of the process.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use analytics_core::catalog::{Job, JobSummary};
use analytics_core::submission::{
    NewStepResult, NewSubmission, StepResult, Submission, SubmissionStatus,
};
use analytics_core::types::{DbId, SubmissionId};

use crate::error::StoreError;
use crate::store::{JobCatalog, ResultStore, Store, SubmissionStore};

#[derive(Default)]
struct State {
    submissions: HashMap<SubmissionId, Submission>,
    results: HashMap<SubmissionId, BTreeMap<u32, StepResult>>,
    next_result_id: DbId,
}

pub struct MemoryStore {
    jobs: Vec<Job>,
    state: RwLock<State>,
}

impl MemoryStore {
    /// Build a store over `jobs`. Every job must pass [`Job::validate`] and
    /// names must be unique.
    pub fn new(mut jobs: Vec<Job>) -> Result<Self, StoreError> {
        jobs.sort_by_key(|j| j.id);
        for job in &jobs {
            job.validate()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        }
        if let Some(dup) = jobs
            .iter()
            .enumerate()
            .find(|(i, j)| jobs[..*i].iter().any(|o| o.name == j.name))
        {
            return Err(StoreError::Corrupt(format!(
                "Job name '{}' appears more than once in the catalog",
                dup.1.name
            )));
        }
        Ok(Self {
            jobs,
            state: RwLock::new(State {
                next_result_id: 1,
                ..State::default()
            }),
        })
    }

    /// Parse a JSON array of jobs.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let jobs: Vec<Job> = serde_json::from_str(json)?;
        Self::new(jobs)
    }

    /// Load a JSON catalog file.
    pub async fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let json = tokio::fs::read_to_string(path).await?;
        let store = Self::from_json(&json)?;
        tracing::info!(path = %path.display(), jobs = store.jobs.len(), "Loaded job catalog");
        Ok(store)
    }
}

#[async_trait]
impl JobCatalog for MemoryStore {
    async fn list_jobs(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<JobSummary>, i64), StoreError> {
        let page = self
            .jobs
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(JobSummary::from)
            .collect();
        Ok((page, self.jobs.len() as i64))
    }

    async fn find_job_by_name(&self, name: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.iter().find(|j| j.name == name).cloned())
    }

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.iter().find(|j| j.id == id).cloned())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, StoreError> {
        let now = Utc::now();
        let submission = Submission {
            id: new.id,
            job_id: new.job_id,
            job_name: new.job_name,
            submission_name: new.submission_name,
            email: new.email,
            input_data: new.input_data,
            parameters: new.parameters,
            requester: new.requester,
            priority: new.priority,
            status: SubmissionStatus::Submitted,
            current_step: None,
            last_message: None,
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.write().await;
        if state.submissions.contains_key(&submission.id) {
            return Err(StoreError::Corrupt(format!(
                "Submission {} already exists",
                submission.id
            )));
        }
        state.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError> {
        Ok(self.state.read().await.submissions.get(&id).cloned())
    }

    async fn list_submissions_by_status(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError> {
        let state = self.state.read().await;
        let mut found: Vec<Submission> = state
            .submissions
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.created_at);
        Ok(found)
    }

    async fn transition_status(
        &self,
        id: SubmissionId,
        from: SubmissionStatus,
        to: SubmissionStatus,
        message: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let submission = state
            .submissions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "submission",
                id: id.to_string(),
            })?;
        if submission.status != from {
            return Ok(false);
        }
        submission.status = to;
        if let Some(message) = message {
            submission.last_message = Some(message.to_string());
        }
        submission.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_progress(
        &self,
        id: SubmissionId,
        current_step: u32,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let submission = state
            .submissions
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "submission",
                id: id.to_string(),
            })?;
        submission.current_step = Some(current_step);
        submission.last_message = Some(message.to_string());
        submission.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn insert_result(&self, new: NewStepResult) -> Result<StepResult, StoreError> {
        let mut state = self.state.write().await;
        if !state.submissions.contains_key(&new.submission_id) {
            return Err(StoreError::NotFound {
                entity: "submission",
                id: new.submission_id.to_string(),
            });
        }
        if state
            .results
            .get(&new.submission_id)
            .is_some_and(|r| r.contains_key(&new.step))
        {
            return Err(StoreError::DuplicateResult {
                submission_id: new.submission_id,
                step: new.step,
            });
        }
        let id = state.next_result_id;
        state.next_result_id += 1;
        let result = new.into_result(id, Utc::now());
        state
            .results
            .entry(result.submission_id)
            .or_default()
            .insert(result.step, result.clone());
        Ok(result)
    }

    async fn list_results(
        &self,
        submission_id: SubmissionId,
    ) -> Result<Vec<StepResult>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .results
            .get(&submission_id)
            .map(|r| r.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
