//! Submission lifecycle events and outbound notifications.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`SubmissionEvent`]: a status change or a recorded step result.
//! - [`NotificationSink`]: where terminal-state notifications go; SMTP via
//!   [`EmailDelivery`] or the log via [`LogSink`].
//! - [`NotificationRouter`]: background service turning terminal events
//!   into notifications.

pub mod bus;
pub mod delivery;
pub mod router;

pub use bus::{EventBus, Recipient, SubmissionEvent, SubmissionEventType};
pub use delivery::email::{EmailConfig, EmailDelivery, EmailError};
pub use delivery::{LogSink, Notification, NotificationSink, RecordingSink, NOTIFICATION_SUBJECT};
pub use router::NotificationRouter;
