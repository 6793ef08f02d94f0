//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans [`SubmissionEvent`]s out to every subscriber. It is
//! shared via `Arc<EventBus>` between the pipeline and the API. Terminal
//! events are additionally delivered to [`EventBus::subscribe_terminal`]
//! receivers over unbounded channels, so a slow consumer never misses one.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use analytics_core::submission::SubmissionStatus;
use analytics_core::types::SubmissionId;

// ---------------------------------------------------------------------------
// SubmissionEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionEventType {
    /// The submission's status changed; `status` is the new one.
    StatusChanged,
    /// A step result was stored; `step` says which.
    ResultRecorded,
}

/// Who to tell when a submission finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub submission_name: String,
}

/// Something that happened to a submission.
///
/// Built with [`SubmissionEvent::status_changed`] or
/// [`SubmissionEvent::result_recorded`] and enriched with
/// [`with_message`](SubmissionEvent::with_message) and
/// [`with_recipient`](SubmissionEvent::with_recipient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionEvent {
    pub event_type: SubmissionEventType,
    pub submission_id: SubmissionId,
    /// Status at the time of the event.
    pub status: SubmissionStatus,
    pub step: Option<u32>,
    pub message: Option<String>,
    pub recipient: Option<Recipient>,
    pub timestamp: DateTime<Utc>,
}

impl SubmissionEvent {
    pub fn status_changed(submission_id: SubmissionId, status: SubmissionStatus) -> Self {
        Self::new(SubmissionEventType::StatusChanged, submission_id, status, None)
    }

    pub fn result_recorded(
        submission_id: SubmissionId,
        status: SubmissionStatus,
        step: u32,
    ) -> Self {
        Self::new(
            SubmissionEventType::ResultRecorded,
            submission_id,
            status,
            Some(step),
        )
    }

    fn new(
        event_type: SubmissionEventType,
        submission_id: SubmissionId,
        status: SubmissionStatus,
        step: Option<u32>,
    ) -> Self {
        Self {
            event_type,
            submission_id,
            status,
            step,
            message: None,
            recipient: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_recipient(
        mut self,
        email: impl Into<String>,
        submission_name: impl Into<String>,
    ) -> Self {
        self.recipient = Some(Recipient {
            email: email.into(),
            submission_name: submission_name.into(),
        });
        self
    }

    /// Whether this event moved the submission into a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.event_type == SubmissionEventType::StatusChanged && self.status.is_terminal()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<SubmissionEvent>,
    terminal: Mutex<Vec<mpsc::UnboundedSender<SubmissionEvent>>>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped and
    /// slow broadcast receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            terminal: Mutex::new(Vec::new()),
        }
    }

    /// Publish to all current subscribers. Dropped silently when there are none.
    pub fn publish(&self, event: SubmissionEvent) {
        if event.is_terminal() {
            self.terminal
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|tx| tx.send(event.clone()).is_ok());
        }
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.sender.subscribe()
    }

    /// Receive every terminal event published from now on, without loss.
    ///
    /// The receiver yields `None` once the bus is dropped.
    pub fn subscribe_terminal(&self) -> mpsc::UnboundedReceiver<SubmissionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.terminal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let id = Uuid::new_v4();

        bus.publish(
            SubmissionEvent::status_changed(id, SubmissionStatus::Complete)
                .with_recipient("a@b.com", "test")
                .with_message("done"),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.submission_id, id);
        assert_eq!(received.status, SubmissionStatus::Complete);
        assert_eq!(received.message.as_deref(), Some("done"));
        assert_eq!(received.recipient.unwrap().email, "a@b.com");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(SubmissionEvent::result_recorded(
            Uuid::new_v4(),
            SubmissionStatus::Running,
            0,
        ));

        assert_eq!(rx1.recv().await.unwrap().step, Some(0));
        assert_eq!(rx2.recv().await.unwrap().step, Some(0));
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventBus::default().publish(SubmissionEvent::status_changed(
            Uuid::new_v4(),
            SubmissionStatus::Running,
        ));
    }

    #[tokio::test]
    async fn terminal_subscriber_sees_terminal_events_past_capacity() {
        let bus = EventBus::new(2);
        let mut lagging = bus.subscribe();
        let mut terminal = bus.subscribe_terminal();

        let ids: Vec<_> = (0..10).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            bus.publish(SubmissionEvent::result_recorded(*id, SubmissionStatus::Running, 0));
            bus.publish(SubmissionEvent::status_changed(*id, SubmissionStatus::Complete));
        }

        assert!(matches!(
            lagging.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));

        drop(bus);
        let mut seen = Vec::new();
        while let Some(event) = terminal.recv().await {
            assert!(event.is_terminal());
            seen.push(event.submission_id);
        }
        assert_eq!(seen, ids);
    }

    #[test]
    fn terminal_only_for_terminal_status_changes() {
        let id = Uuid::new_v4();
        assert!(SubmissionEvent::status_changed(id, SubmissionStatus::Crash).is_terminal());
        assert!(!SubmissionEvent::status_changed(id, SubmissionStatus::Running).is_terminal());
        assert!(!SubmissionEvent::result_recorded(id, SubmissionStatus::Error, 1).is_terminal());
    }
}
