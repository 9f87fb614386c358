//! Channel readiness and per-attempt outcome types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the three configuration values the delivery channel needs.
///
/// The declaration order is the order the probe checks them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigField {
    Service,
    Template,
    PublicKey,
}

impl ConfigField {
    /// Fixed probe order.
    pub const ALL: [ConfigField; 3] = [
        ConfigField::Service,
        ConfigField::Template,
        ConfigField::PublicKey,
    ];

    /// Short name used as the misconfiguration reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigField::Service => "service",
            ConfigField::Template => "template",
            ConfigField::PublicKey => "key",
        }
    }

    /// Environment variable an operator sets to fix this field.
    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigField::Service => "EMAILJS_SERVICE_ID",
            ConfigField::Template => "EMAILJS_TEMPLATE_ID",
            ConfigField::PublicKey => "EMAILJS_PUBLIC_KEY",
        }
    }

    /// Operator-facing explanation shown in the blocked panel.
    pub fn explanation(&self) -> String {
        let what = match self {
            ConfigField::Service => "Service ID",
            ConfigField::Template => "Template ID",
            ConfigField::PublicKey => "Public Key",
        };
        format!(
            "Email relay {} not configured. Please set {} in your environment variables.",
            what,
            self.env_var()
        )
    }
}

impl std::fmt::Display for ConfigField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readiness of the delivery channel as last determined by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ChannelStatus {
    Unknown,
    Checking,
    Ready,
    Misconfigured(ConfigField),
}

impl ChannelStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ChannelStatus::Ready)
    }
}

/// Result of a single submission attempt.
///
/// Never persisted: it drives one notification and is then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Success,
    /// Network failure (`"network"`) or a rejection carrying the server's message.
    TransportError(String),
    /// The attempt was refused because the channel is not ready.
    ChannelUnavailable,
}

impl SubmissionOutcome {
    pub const NETWORK: &'static str = "network";

    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Success)
    }

    /// Label used for the `outcome` metric dimension.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionOutcome::Success => "success",
            SubmissionOutcome::TransportError(_) => "transport_error",
            SubmissionOutcome::ChannelUnavailable => "channel_unavailable",
        }
    }
}

/// Identifier attached to every log line of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AttemptId(pub Uuid);

impl AttemptId {
    pub fn new() -> Self {
        AttemptId(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for AttemptId {
    fn from(uuid: Uuid) -> Self {
        AttemptId(uuid)
    }
}
