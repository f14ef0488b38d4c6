//! # Notification Gateway
//!
//! Fire-and-forget message dispatch. Every caller goes through
//! [`notify_best_effort`], which logs and counts failures and never returns
//! them: a notification outcome can not undo a committed state change.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A dispatch attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification to {recipient} failed: {reason}")]
pub struct NotificationError {
    /// Intended recipient.
    pub recipient: String,
    /// Failure detail.
    pub reason: String,
}

/// Outbound message transport.
pub trait NotificationGateway: Send + Sync {
    /// Deliver one message.
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError>;
}

/// Which workflow a notification belongs to, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Certificate generated.
    Generated,
    /// Certificate revoked.
    Revoked,
    /// Expiry warning at a threshold.
    ExpiryWarning,
    /// Administrator batch report.
    AdminReport,
}

impl NotificationKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Revoked => "revoked",
            Self::ExpiryWarning => "expiry_warning",
            Self::AdminReport => "admin_report",
        }
    }
}

/// Send and swallow the outcome. Returns whether delivery succeeded.
pub fn notify_best_effort(
    gateway: &dyn NotificationGateway,
    kind: NotificationKind,
    to: &str,
    subject: &str,
    body: &str,
) -> bool {
    match gateway.send(to, subject, body) {
        Ok(()) => {
            metrics::counter!("holdcert_notifications_total", "kind" => kind.as_str(), "outcome" => "sent")
                .increment(1);
            true
        }
        Err(e) => {
            metrics::counter!("holdcert_notifications_total", "kind" => kind.as_str(), "outcome" => "failed")
                .increment(1);
            tracing::warn!(kind = kind.as_str(), recipient = to, error = %e, "notification failed");
            false
        }
    }
}

/// Writes notifications to the log. Used when no mail transport is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationGateway for LogNotifier {
    fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), NotificationError> {
        tracing::info!(recipient = to, subject, "notification dispatched");
        Ok(())
    }
}

/// A delivered message as captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    /// Recipient.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body.
    pub body: String,
}

/// Captures messages in memory; can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    attempts: Mutex<usize>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    /// A notifier that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail (`true`) or succeed (`false`).
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    /// Messages delivered so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Messages delivered to `to`.
    pub fn sent_to(&self, to: &str) -> Vec<SentMessage> {
        self.sent.lock().iter().filter(|m| m.to == to).cloned().collect()
    }

    /// Sends attempted, including failed ones.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

impl NotificationGateway for RecordingNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        *self.attempts.lock() += 1;
        if *self.failing.lock() {
            return Err(NotificationError {
                recipient: to.to_string(),
                reason: "transport unavailable".into(),
            });
        }
        self.sent.lock().push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
