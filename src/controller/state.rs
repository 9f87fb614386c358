//! Controller states as seen by the UI layer.

use serde::Serialize;

use crate::domain::{AttemptId, ConfigField, SubmissionOutcome};

/// How the most recent finished attempt went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "outcome", rename_all = "snake_case")]
pub enum LastAttempt {
    /// Form fields were cleared and a redirect is scheduled.
    Success,
    /// Form fields were kept so the user can correct and resubmit.
    Failed(SubmissionOutcome),
}

/// State of a submission controller.
///
/// ```text
/// Init ──start()──> Checking ──probe──> Idle(None)      (Ready)
///                      ^        └─────> Blocked(field)
///                      └──retry_probe()──┘
///
/// Idle ──submit()──> Submitting ──send──> Idle(Some(Success | Failed))
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ControllerState {
    /// Constructed, no probe issued yet.
    Init,
    /// Probe in flight.
    Checking,
    /// Probe found a misconfigured field; submission is disabled.
    Blocked(ConfigField),
    /// Channel ready; submit enabled.
    Idle(Option<LastAttempt>),
    /// One submission in flight; submit disabled.
    Submitting(AttemptId),
}

impl ControllerState {
    /// Name of the state, for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            ControllerState::Init => "init",
            ControllerState::Checking => "checking",
            ControllerState::Blocked(_) => "blocked",
            ControllerState::Idle(_) => "idle",
            ControllerState::Submitting(_) => "submitting",
        }
    }

    /// Whether the UI should enable its submit action.
    pub fn can_submit(&self) -> bool {
        matches!(self, ControllerState::Idle(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, ControllerState::Blocked(_))
    }

    pub fn is_checking(&self) -> bool {
        matches!(self, ControllerState::Checking)
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, ControllerState::Submitting(_))
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
