//! Pipeline executor: runs one submission's steps in order.
//!
//! Each step gets exactly one stored result, success or failure, and the
//! first failing step ends the run. Steps of one submission share a working
//! directory under their backend's root path, so later steps see earlier
//! steps' files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use analytics_core::blob::LocalBlobStore;
use analytics_core::catalog::{Backend, Step};
use analytics_core::error::CoreError;
use analytics_core::submission::{NewStepResult, Submission, SubmissionStatus};
use analytics_core::types::{DbId, SubmissionId};
use analytics_db::{JobCatalog, ResultStore, Store, SubmissionStore};
use analytics_events::SubmissionEvent;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::runner::{BackendRunner, StepOutcome, StepRequest};
use crate::tracker::StatusTracker;

/// How a run ended, before the final transition is applied.
enum Finished {
    Complete { steps: usize },
    Failed {
        status: SubmissionStatus,
        message: String,
    },
}

pub struct PipelineExecutor {
    store: Arc<dyn Store>,
    runner: Arc<dyn BackendRunner>,
    blobs: LocalBlobStore,
    tracker: StatusTracker,
    config: PipelineConfig,
    /// Per-backend concurrency gates, created on first use.
    gates: Mutex<HashMap<DbId, Arc<Semaphore>>>,
}

impl PipelineExecutor {
    pub fn new(
        store: Arc<dyn Store>,
        runner: Arc<dyn BackendRunner>,
        blobs: LocalBlobStore,
        tracker: StatusTracker,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            runner,
            blobs,
            tracker,
            config,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Drive `submission_id` from `Submitted` to a terminal state.
    ///
    /// Returns the final status. A submission that is no longer `Submitted`
    /// is left alone and its current status returned.
    pub async fn run(&self, submission_id: SubmissionId) -> Result<SubmissionStatus, PipelineError> {
        let submission = self
            .store
            .find_submission(submission_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "submission",
                id: submission_id.to_string(),
            })?;

        if submission.status != SubmissionStatus::Submitted {
            tracing::warn!(
                submission_id = %submission.id,
                status = %submission.status,
                "Dequeued submission is not waiting, skipping"
            );
            return Ok(submission.status);
        }

        self.tracker
            .transition(
                &submission,
                SubmissionStatus::Submitted,
                SubmissionStatus::Running,
                None,
            )
            .await?;

        let finished = match self.run_steps(&submission).await {
            Ok(finished) => finished,
            Err(e) => {
                tracing::error!(
                    submission_id = %submission.id,
                    error = %e,
                    "Pipeline aborted"
                );
                let message = format!("Internal failure: {e}");
                if let Err(mark) = self
                    .tracker
                    .transition(
                        &submission,
                        SubmissionStatus::Running,
                        SubmissionStatus::Crash,
                        Some(&message),
                    )
                    .await
                {
                    tracing::error!(
                        submission_id = %submission.id,
                        error = %mark,
                        "Failed to mark aborted submission as crashed"
                    );
                }
                return Err(e);
            }
        };

        let (status, message) = match finished {
            Finished::Complete { steps } => (
                SubmissionStatus::Complete,
                format!("Completed {steps} step(s)"),
            ),
            Finished::Failed { status, message } => (status, message),
        };
        self.tracker
            .transition(&submission, SubmissionStatus::Running, status, Some(&message))
            .await?;
        Ok(status)
    }

    async fn run_steps(&self, submission: &Submission) -> Result<Finished, PipelineError> {
        let job = self
            .store
            .find_job(submission.job_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "job",
                id: submission.job_id.to_string(),
            })?;

        let steps = job.ordered_steps();
        let mut prepared: HashMap<PathBuf, PathBuf> = HashMap::new();

        for step in &steps {
            let task = &step.task;
            self.store
                .update_progress(
                    submission.id,
                    step.ordering,
                    &format!("Running step {} ({})", step.ordering, task.name),
                )
                .await?;
            self.tracker
                .transition(
                    submission,
                    SubmissionStatus::Running,
                    SubmissionStatus::Running,
                    None,
                )
                .await?;

            let outcome = match self.prepare_workdir(submission, &task.backend, &mut prepared).await {
                Ok((working_directory, input_path)) => {
                    let _permit = self.acquire(&task.backend).await;
                    tracing::info!(
                        submission_id = %submission.id,
                        step = step.ordering,
                        task = %task.name,
                        "Executing step"
                    );
                    self.runner
                        .execute(StepRequest {
                            submission_id: submission.id,
                            step: step.ordering,
                            task: task.clone(),
                            parameters: submission.parameters.clone(),
                            input_path,
                            working_directory,
                            timeout: task
                                .timeout_secs
                                .map(std::time::Duration::from_secs)
                                .unwrap_or(self.config.step_timeout),
                        })
                        .await
                }
                Err(e) => StepOutcome::Crash {
                    message: format!("Failed to prepare working directory: {e}"),
                },
            };

            self.record(submission, step, &outcome).await?;

            match outcome {
                StepOutcome::Success { .. } => {}
                StepOutcome::ExecutionError { message } => {
                    tracing::warn!(
                        submission_id = %submission.id,
                        step = step.ordering,
                        task = %task.name,
                        %message,
                        "Step reported an error"
                    );
                    return Ok(Finished::Failed {
                        status: SubmissionStatus::Error,
                        message,
                    });
                }
                StepOutcome::Crash { message } => {
                    tracing::error!(
                        submission_id = %submission.id,
                        step = step.ordering,
                        task = %task.name,
                        %message,
                        "Step crashed"
                    );
                    return Ok(Finished::Failed {
                        status: SubmissionStatus::Crash,
                        message,
                    });
                }
            }
        }

        Ok(Finished::Complete { steps: steps.len() })
    }

    /// Store the step's result and announce it.
    async fn record(
        &self,
        submission: &Submission,
        step: &Step,
        outcome: &StepOutcome,
    ) -> Result<(), PipelineError> {
        let result_data = match outcome {
            StepOutcome::Success { result_data, .. } => result_data.clone(),
            _ => None,
        };
        self.store
            .insert_result(NewStepResult {
                submission_id: submission.id,
                task_id: step.task.id,
                task_name: step.task.name.clone(),
                step: step.ordering,
                name: step.task.name.clone(),
                message: outcome.message().to_string(),
                result_data,
            })
            .await?;

        self.tracker.events().publish(
            SubmissionEvent::result_recorded(submission.id, SubmissionStatus::Running, step.ordering)
                .with_message(outcome.message()),
        );
        Ok(())
    }

    /// Create `<root_path>/<submission_id>/` and copy the input into it,
    /// once per run. Returns the directory and the input's path inside it.
    async fn prepare_workdir(
        &self,
        submission: &Submission,
        backend: &Backend,
        prepared: &mut HashMap<PathBuf, PathBuf>,
    ) -> std::io::Result<(PathBuf, PathBuf)> {
        let workdir = Path::new(&backend.root_path).join(submission.id.to_string());
        if let Some(input) = prepared.get(&workdir) {
            return Ok((workdir, input.clone()));
        }

        tokio::fs::create_dir_all(&workdir).await?;
        let input = workdir.join(submission.input_data.file_name());
        tokio::fs::copy(self.blobs.path(&submission.input_data), &input).await?;
        tracing::debug!(
            submission_id = %submission.id,
            working_directory = %workdir.display(),
            "Prepared working directory"
        );

        prepared.insert(workdir.clone(), input.clone());
        Ok((workdir, input))
    }

    /// Wait for a slot on `backend` when it declares a concurrency limit.
    /// A limit of zero is treated as unbounded.
    async fn acquire(&self, backend: &Backend) -> Option<OwnedSemaphorePermit> {
        let limit = backend.max_concurrency.filter(|n| *n > 0)?;
        let gate = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(backend.id)
            .or_insert_with(|| Arc::new(Semaphore::new(limit as usize)))
            .clone();
        gate.acquire_owned().await.ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
