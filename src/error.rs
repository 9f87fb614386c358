//! Error types for the submission subsystem.

use thiserror::Error;

use crate::domain::submission::ValidationError;

/// Result type alias using the formgate error type.
pub type Result<T> = std::result::Result<T, FormgateError>;

/// Main error type for the submission subsystem.
///
/// Delivery failures are not represented here: they are classified into a
/// [`SubmissionOutcome`](crate::domain::SubmissionOutcome) at the delivery
/// boundary. These variants cover what happens before an attempt is made and
/// the raw transport errors the delivery client classifies.
#[derive(Error, Debug)]
pub enum FormgateError {
    /// The form draft failed caller-side validation and was never encoded
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A submission for this controller is already in flight
    #[error("A submission is already in flight")]
    SubmissionInFlight,

    /// The controller is in a state that does not allow the requested transition
    #[error("Invalid state transition: controller is in state '{0}', cannot move to '{1}'")]
    InvalidState(String, String),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
