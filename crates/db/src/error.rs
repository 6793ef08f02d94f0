use analytics_core::types::SubmissionId;

/// Failures raised by a [`Store`](crate::Store) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    /// A result for this (submission, step) pair was already recorded.
    #[error("Result already recorded for submission {submission_id} step {step}")]
    DuplicateResult {
        submission_id: SubmissionId,
        step: u32,
    },

    /// Stored data does not satisfy a domain invariant.
    #[error("Invalid stored data: {0}")]
    Corrupt(String),
}
