//! Start-up recovery.
//!
//! The admission queue lives in memory, so after a restart the stored
//! submissions are the only record of outstanding work. `Submitted` ones go
//! back into the queue; `Running` ones lost their worker and are crashed.

use std::sync::Arc;

use serde::Serialize;

use analytics_core::submission::{NewStepResult, Submission, SubmissionStatus};
use analytics_db::{JobCatalog, ResultStore, Store, SubmissionStore};

use crate::error::PipelineError;
use crate::queue::AdmissionQueue;
use crate::tracker::StatusTracker;

/// Message recorded on submissions interrupted by a restart.
pub const INTERRUPTED_MESSAGE: &str = "Interrupted by service restart";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub requeued: usize,
    pub crashed: usize,
}

/// Re-admit waiting submissions and crash the ones that were running.
pub async fn recover(
    store: &Arc<dyn Store>,
    queue: &AdmissionQueue,
    tracker: &StatusTracker,
) -> Result<RecoveryReport, PipelineError> {
    let mut report = RecoveryReport::default();

    for submission in store
        .list_submissions_by_status(SubmissionStatus::Submitted)
        .await?
    {
        queue.readmit(submission.id, &submission.requester, submission.priority);
        report.requeued += 1;
    }

    for submission in store
        .list_submissions_by_status(SubmissionStatus::Running)
        .await?
    {
        record_interrupted_step(store, &submission).await?;
        match tracker
            .transition(
                &submission,
                SubmissionStatus::Running,
                SubmissionStatus::Crash,
                Some(INTERRUPTED_MESSAGE),
            )
            .await
        {
            Ok(()) => report.crashed += 1,
            Err(PipelineError::StaleStatus { .. }) => {}
            Err(e) => return Err(e),
        }
    }

    if report.requeued > 0 || report.crashed > 0 {
        tracing::info!(
            requeued = report.requeued,
            crashed = report.crashed,
            "Recovered submissions from previous run"
        );
    }
    Ok(report)
}

/// Give the step that was executing a crash result, unless it already has
/// one.
async fn record_interrupted_step(
    store: &Arc<dyn Store>,
    submission: &Submission,
) -> Result<(), PipelineError> {
    let Some(step) = submission.current_step else {
        return Ok(());
    };
    let results = store.list_results(submission.id).await?;
    if results.iter().any(|r| r.step == step) {
        return Ok(());
    }

    let Some(job) = store.find_job(submission.job_id).await? else {
        tracing::warn!(
            submission_id = %submission.id,
            job_id = submission.job_id,
            "Job of interrupted submission no longer exists"
        );
        return Ok(());
    };
    let Some(task) = job
        .ordered_steps()
        .into_iter()
        .find(|s| s.ordering == step)
        .map(|s| s.task.clone())
    else {
        return Ok(());
    };

    store
        .insert_result(NewStepResult {
            submission_id: submission.id,
            task_id: task.id,
            task_name: task.name.clone(),
            step,
            name: task.name,
            message: INTERRUPTED_MESSAGE.to_string(),
            result_data: None,
        })
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
