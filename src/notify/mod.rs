//! Notification delivery for settled tickets and operator summaries
//!
//! The settlement engine hands every payload to a [`NotificationSink`] and
//! never looks at the result beyond logging it. Sinks:
//!
//! - [`LogSink`]: writes the payload to the log, used when no endpoint is configured
//! - [`webhook::WebhookSink`]: signed JSON POST to the bot webhook
//! - [`dispatcher::QueuedSink`]: background queue so delivery never blocks a settlement

pub mod dispatcher;
pub mod webhook;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub use dispatcher::{DeliveryStats, QueuedSink};
pub use webhook::{sign_payload, verify_signature, WebhookSink};

/// A message for one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: String,
    pub message: String,
    pub amount: f64,
}

impl Notification {
    pub fn new(recipient_id: impl Into<String>, message: impl Into<String>, amount: f64) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            message: message.into(),
            amount,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected notification: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("webhook circuit open, skipping delivery")]
    CircuitOpen,

    #[error("notification queue is closed")]
    QueueClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Best-effort delivery of notifications
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).deliver(notification)
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for Box<T> {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).deliver(notification)
    }
}

/// Logs notifications instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient_id,
            amount = notification.amount,
            "Notification: {}",
            notification.message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sink_accepts_everything() {
        let sink = LogSink;
        let n = Notification::new("user-1", "hello", 5.0);
        assert!(sink.deliver(&n).is_ok());
    }

    #[test]
    fn test_arc_sink_forwards() {
        let sink: Arc<dyn NotificationSink> = Arc::new(LogSink);
        assert!(sink.deliver(&Notification::new("owner", "summary", 0.0)).is_ok());
    }
}
