//! Core domain types for form submission.
//!
//! This module contains pure domain types with no transport dependencies:
//! - Form models and caller-side validation
//! - Channel status and submission outcomes

pub mod status;
pub mod submission;

pub use status::{AttemptId, ChannelStatus, ConfigField, SubmissionOutcome};
pub use submission::{
    CertificationApplication, ContactMessage, FormKind, FormSubmission, InquiryType,
    NewsletterSignup, Problem, SubmissionForm, ValidationError,
};
