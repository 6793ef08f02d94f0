//! Submissions, their results, and the submission status state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blob::BlobRef;
use crate::parameters::BoundParameters;
use crate::types::{DbId, SubmissionId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Externally visible submission state.
///
/// Discriminants are the values persisted in `submissions.status`.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Submitted = 0,
    Running = 1,
    Complete = 2,
    Error = 3,
    Crash = 4,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 5] = [
        Self::Submitted,
        Self::Running,
        Self::Complete,
        Self::Error,
        Self::Crash,
    ];

    /// Return the persisted status ID.
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Running => "Running",
            Self::Complete => "Complete",
            Self::Error => "Error",
            Self::Crash => "Crash",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Crash)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition table for [`SubmissionStatus`].
pub mod state_machine {
    use super::SubmissionStatus::{self, *};
    use crate::error::CoreError;

    /// Statuses reachable from `from`. Terminal states return an empty slice.
    pub fn valid_transitions(from: SubmissionStatus) -> &'static [SubmissionStatus] {
        match from {
            Submitted => &[Running],
            // Running -> Running is the between-steps no-op.
            Running => &[Running, Complete, Error, Crash],
            Complete | Error | Crash => &[],
        }
    }

    pub fn can_transition(from: SubmissionStatus, to: SubmissionStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    pub fn validate_transition(
        from: SubmissionStatus,
        to: SubmissionStatus,
    ) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { from, to })
        }
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// One user request to run a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub job_id: DbId,
    pub job_name: String,
    pub submission_name: String,
    pub email: String,
    pub input_data: BlobRef,
    pub parameters: BoundParameters,
    /// Identity the fairness policy counts against.
    pub requester: String,
    pub priority: i32,
    pub status: SubmissionStatus,
    /// Ordering index of the step currently (or last) executing.
    pub current_step: Option<u32>,
    pub last_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Fields supplied when a validated submission is first stored.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub id: SubmissionId,
    pub job_id: DbId,
    pub job_name: String,
    pub submission_name: String,
    pub email: String,
    pub input_data: BlobRef,
    pub parameters: BoundParameters,
    pub requester: String,
    pub priority: i32,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Recorded outcome of one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub id: DbId,
    pub submission_id: SubmissionId,
    pub task_id: DbId,
    pub task_name: String,
    pub step: u32,
    pub name: String,
    pub message: String,
    pub result_data: Option<BlobRef>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct NewStepResult {
    pub submission_id: SubmissionId,
    pub task_id: DbId,
    pub task_name: String,
    pub step: u32,
    pub name: String,
    pub message: String,
    pub result_data: Option<BlobRef>,
}

impl NewStepResult {
    pub fn into_result(self, id: DbId, created_at: Timestamp) -> StepResult {
        StepResult {
            id,
            submission_id: self.submission_id,
            task_id: self.task_id,
            task_name: self.task_name,
            step: self.step,
            name: self.name,
            message: self.message,
            result_data: self.result_data,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
