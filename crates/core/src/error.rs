use crate::submission::SubmissionStatus;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Structurally invalid intake: missing or blank required field, bad email.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The submitted job key does not name a known job.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// One or more `<task>_<alias>` parameters required by the job were not bound.
    #[error("Missing parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    /// A bound parameter value violates its declared rule.
    #[error("Invalid value for parameter {key}: {reason}")]
    InvalidParameter { key: String, reason: String },

    /// Admission backpressure: the queue is at its hard limit.
    #[error("Queue full: {depth} submissions in flight (hard limit {limit})")]
    QueueFull { depth: usize, limit: usize },

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the error describes a well-formed but semantically unacceptable
    /// request, as opposed to a structurally broken one.
    pub fn is_not_acceptable(&self) -> bool {
        matches!(
            self,
            Self::UnknownJob(_) | Self::MissingParameters(_) | Self::InvalidParameter { .. }
        )
    }
}
