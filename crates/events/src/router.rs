//! Notification router.
//!
//! [`NotificationRouter`] consumes the terminal events of the
//! [`EventBus`](crate::EventBus) and sends one notification per submission
//! that reaches a terminal state. It runs as a long-lived background task and
//! exits when the bus is dropped.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bus::SubmissionEvent;
use crate::delivery::{Notification, NotificationSink};

pub struct NotificationRouter {
    sink: Arc<dyn NotificationSink>,
    public_base_url: String,
}

impl NotificationRouter {
    /// `public_base_url` is the externally reachable root of the API, used to
    /// build the results link in each notification.
    pub fn new(sink: Arc<dyn NotificationSink>, public_base_url: impl Into<String>) -> Self {
        Self {
            sink,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Where a submission's results can be retrieved.
    pub fn results_url(&self, event: &SubmissionEvent) -> String {
        format!(
            "{}/api/v1/submissions/{}",
            self.public_base_url, event.submission_id
        )
    }

    /// Run the routing loop until the channel closes.
    ///
    /// Takes the receiver from [`EventBus::subscribe_terminal`](crate::EventBus::subscribe_terminal),
    /// which buffers without bound, so a slow sink delays notifications but
    /// never drops them.
    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<SubmissionEvent>) {
        while let Some(event) = receiver.recv().await {
            self.handle(&event).await;
        }
        tracing::info!("Event bus closed, notification router shutting down");
    }

    async fn handle(&self, event: &SubmissionEvent) {
        if !event.is_terminal() {
            return;
        }
        let Some(recipient) = &event.recipient else {
            tracing::warn!(
                submission_id = %event.submission_id,
                "Terminal event without a recipient, no notification sent"
            );
            return;
        };

        let notification = Notification::submission_finished(
            &recipient.email,
            event.submission_id,
            &recipient.submission_name,
            event.status,
            &self.results_url(event),
        );
        if let Err(e) = self.sink.send(&notification).await {
            tracing::error!(
                error = %e,
                submission_id = %event.submission_id,
                "Failed to send completion notification"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
