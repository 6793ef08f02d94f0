//! Status tracker: the only writer of a submission's status.
//!
//! Every change is checked against
//! [`state_machine`](analytics_core::submission::state_machine), applied to
//! storage as a compare-and-set, and published on the event bus.

use std::sync::Arc;

use analytics_core::submission::{state_machine, Submission, SubmissionStatus};
use analytics_db::{Store, SubmissionStore};
use analytics_events::{EventBus, SubmissionEvent};

use crate::error::PipelineError;

#[derive(Clone)]
pub struct StatusTracker {
    store: Arc<dyn Store>,
    events: Arc<EventBus>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn Store>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Move `submission` from `from` to `to`.
    ///
    /// `Running -> Running` is accepted and changes nothing. Any transition
    /// out of a terminal state fails with `InvalidTransition`; a stored
    /// status other than `from` fails with [`PipelineError::StaleStatus`].
    pub async fn transition(
        &self,
        submission: &Submission,
        from: SubmissionStatus,
        to: SubmissionStatus,
        message: Option<&str>,
    ) -> Result<(), PipelineError> {
        state_machine::validate_transition(from, to)?;
        if from == to {
            return Ok(());
        }

        let applied = self
            .store
            .transition_status(submission.id, from, to, message)
            .await?;
        if !applied {
            return Err(PipelineError::StaleStatus {
                id: submission.id,
                expected: from,
            });
        }

        tracing::info!(
            submission_id = %submission.id,
            from = %from,
            to = %to,
            "Submission status changed"
        );

        let mut event = SubmissionEvent::status_changed(submission.id, to)
            .with_recipient(&submission.email, &submission.submission_name);
        if let Some(message) = message {
            event = event.with_message(message);
        }
        self.events.publish(event);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
