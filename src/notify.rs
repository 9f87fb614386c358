//! What the controller tells the UI layer.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::SubmissionOutcome;

/// Characters left as-is in a mailto query component.
const MAILTO_QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A user-visible message, one per finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Notification {
    Success(String),
    Failure(String),
}

impl Notification {
    /// Notification for a finished attempt.
    pub fn for_outcome(outcome: &SubmissionOutcome, success_message: &str) -> Self {
        match outcome {
            SubmissionOutcome::Success => Notification::Success(success_message.to_string()),
            SubmissionOutcome::TransportError(message) if message == SubmissionOutcome::NETWORK => {
                Notification::Failure(
                    "Network error: could not reach the form service. Please try again."
                        .to_string(),
                )
            }
            SubmissionOutcome::TransportError(message) => Notification::Failure(message.clone()),
            SubmissionOutcome::ChannelUnavailable => Notification::Failure(
                "Online submission is currently unavailable. Please contact us directly."
                    .to_string(),
            ),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Notification::Success(m) | Notification::Failure(m) => m,
        }
    }
}

/// Receives notifications and the post-success redirect signal.
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: Notification);

    /// Called once, after the reset delay, following a successful submission.
    fn redirect(&self) {}
}

/// Event forwarded by the channel-backed sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Notify(Notification),
    Redirect,
}

impl NotificationSink for UnboundedSender<UiEvent> {
    fn notify(&self, notification: Notification) {
        if self.send(UiEvent::Notify(notification)).is_err() {
            tracing::debug!("UI event receiver dropped, notification discarded");
        }
    }

    fn redirect(&self) {
        if self.send(UiEvent::Redirect).is_err() {
            tracing::debug!("UI event receiver dropped, redirect discarded");
        }
    }
}

/// Direct-contact action offered while the channel is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManualFallback {
    pub address: String,
    pub subject: String,
}

impl ManualFallback {
    pub fn new(address: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            subject: subject.into(),
        }
    }

    /// `mailto:` URI with the subject prefilled.
    pub fn mailto_uri(&self) -> String {
        format!(
            "mailto:{}?subject={}",
            self.address,
            utf8_percent_encode(&self.subject, MAILTO_QUERY)
        )
    }
}
