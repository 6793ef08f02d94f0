use analytics_core::error::CoreError;
use analytics_db::StoreError;

/// Failures that stop the executor from driving a submission.
///
/// Step failures are not errors here; they are outcomes recorded on the
/// submission.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Another writer changed the status first.
    #[error("Submission {id} was not in state {expected}")]
    StaleStatus {
        id: analytics_core::types::SubmissionId,
        expected: analytics_core::submission::SubmissionStatus,
    },
}
