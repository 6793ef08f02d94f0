//! Outbound notification channels.

pub mod email;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use analytics_core::submission::SubmissionStatus;
use analytics_core::types::SubmissionId;

/// Fixed subject line of every completion notification.
pub const NOTIFICATION_SUBJECT: &str = "Your analysis job has finished";

/// A message addressed to a submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Completion notice pointing at the submission's results.
    pub fn submission_finished(
        to: &str,
        submission_id: SubmissionId,
        submission_name: &str,
        status: SubmissionStatus,
        results_url: &str,
    ) -> Self {
        let outcome = match status {
            SubmissionStatus::Complete => "completed successfully",
            SubmissionStatus::Error => "stopped because a step reported an error",
            SubmissionStatus::Crash => "stopped because a step crashed",
            SubmissionStatus::Submitted | SubmissionStatus::Running => "changed state",
        };
        let body = format!(
            "Your submission \"{submission_name}\" ({submission_id}) {outcome}.\n\n\
             Final state: {status}\n\
             Results: {results_url}\n"
        );
        Self {
            to: to.to_string(),
            subject: NOTIFICATION_SUBJECT.to_string(),
            body,
        }
    }
}

/// Somewhere notifications can be sent.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification. Callers treat delivery as fire-and-forget
    /// and only log a failure.
    async fn send(&self, notification: &Notification) -> Result<(), email::EmailError>;
}

/// Writes notifications to the log instead of sending them. Used when SMTP
/// is not configured.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, notification: &Notification) -> Result<(), email::EmailError> {
        tracing::info!(
            to = %notification.to,
            subject = %notification.subject,
            body = %notification.body,
            "Notification (email delivery not configured)"
        );
        Ok(())
    }
}

/// Keeps every notification in memory. Lets tests observe what would have
/// been sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, notification: &Notification) -> Result<(), email::EmailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}
