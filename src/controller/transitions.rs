//! Allowed moves between controller states.
//!
//! Each method takes the current state and returns the next one, or
//! [`FormgateError::InvalidState`] if the move is not allowed from here. The
//! controller applies the result while holding its state lock, so checking
//! and moving happen in one step.

use crate::domain::{AttemptId, ChannelStatus, SubmissionOutcome};
use crate::error::{FormgateError, Result};

use super::state::{ControllerState, LastAttempt};

fn invalid(from: &ControllerState, to: &str) -> FormgateError {
    FormgateError::InvalidState(from.name().to_string(), to.to_string())
}

impl ControllerState {
    /// Init, Blocked or Idle → Checking.
    pub fn begin_check(&self) -> Result<ControllerState> {
        match self {
            ControllerState::Init | ControllerState::Blocked(_) | ControllerState::Idle(_) => {
                Ok(ControllerState::Checking)
            }
            _ => Err(invalid(self, "checking")),
        }
    }

    /// Checking → Idle or Blocked, depending on the probe result.
    pub fn finish_check(&self, status: ChannelStatus) -> Result<ControllerState> {
        match (self, status) {
            (ControllerState::Checking, ChannelStatus::Ready) => Ok(ControllerState::Idle(None)),
            (ControllerState::Checking, ChannelStatus::Misconfigured(field)) => {
                Ok(ControllerState::Blocked(field))
            }
            (ControllerState::Checking, _) => Err(FormgateError::InvalidState(
                self.name().to_string(),
                format!("{:?}", status),
            )),
            _ => Err(invalid(self, "idle")),
        }
    }

    /// Idle → Submitting. A second submit while one is in flight is refused
    /// with [`FormgateError::SubmissionInFlight`].
    pub fn begin_submit(&self, attempt_id: AttemptId) -> Result<ControllerState> {
        match self {
            ControllerState::Idle(_) => Ok(ControllerState::Submitting(attempt_id)),
            ControllerState::Submitting(_) => Err(FormgateError::SubmissionInFlight),
            _ => Err(invalid(self, "submitting")),
        }
    }

    /// Submitting → Idle carrying the attempt's result.
    pub fn finish_submit(&self, outcome: &SubmissionOutcome) -> Result<ControllerState> {
        match self {
            ControllerState::Submitting(_) => {
                let last = if outcome.is_success() {
                    LastAttempt::Success
                } else {
                    LastAttempt::Failed(outcome.clone())
                };
                Ok(ControllerState::Idle(Some(last)))
            }
            _ => Err(invalid(self, "idle")),
        }
    }
}
