//! Typed form models and the caller-side validation applied before encoding.
//!
//! Every form the site exposes has a model here. The models are plain data:
//! the UI layer edits them field by field, the controller validates them with
//! [`SubmissionForm::validate`] and only a model that passed validation ever
//! reaches the encoder.

use chrono::{Local, NaiveDate};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encode::Encode;

/// Which form a submission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    CertificationApplication,
    ContactMessage,
    NewsletterSignup,
}

impl FormKind {
    /// The constant tag sent as `form_type` on the wire.
    pub fn as_tag(&self) -> &'static str {
        match self {
            FormKind::CertificationApplication => "Certification Application",
            FormKind::ContactMessage => "Contact Message",
            FormKind::NewsletterSignup => "Newsletter Signup",
        }
    }

    /// Message shown to the user once the form has been delivered.
    pub fn success_message(&self) -> &'static str {
        match self {
            FormKind::CertificationApplication => {
                "Application submitted successfully! We'll be in touch within 5 business days."
            }
            FormKind::ContactMessage => "Thank you for your message! We'll get back to you soon.",
            FormKind::NewsletterSignup => "Thanks for subscribing to our newsletter!",
        }
    }

    /// Short label used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormKind::CertificationApplication => "certification_application",
            FormKind::ContactMessage => "contact_message",
            FormKind::NewsletterSignup => "newsletter_signup",
        }
    }
}

impl std::fmt::Display for FormKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is wrong with a single form field.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    #[error("is required")]
    Missing,
    #[error("is not a valid email address")]
    InvalidEmail,
    #[error("is not a valid http(s) URL")]
    InvalidUrl,
    #[error("must be today or later")]
    LaunchDateInPast,
    #[error("must be accepted")]
    ConsentRequired,
}

/// A form draft that failed validation. Names the first offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} {problem}")]
pub struct ValidationError {
    pub field: &'static str,
    pub problem: Problem,
}

impl ValidationError {
    pub fn new(field: &'static str, problem: Problem) -> Self {
        Self { field, problem }
    }
}

/// A form model the submission controller can drive.
///
/// `Default` is the empty form the controller resets to after a successful
/// submission.
pub trait SubmissionForm: Encode + Default + Clone + Send + Sync + 'static {
    /// Validate the draft against the given calendar date.
    fn validate_on(&self, today: NaiveDate) -> Result<(), ValidationError>;

    /// Validate the draft against the local calendar date.
    fn validate(&self) -> Result<(), ValidationError> {
        self.validate_on(Local::now().date_naive())
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, Problem::Missing));
    }
    Ok(())
}

fn require_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require(field, value)?;
    if !EmailAddress::is_valid(value.trim()) {
        return Err(ValidationError::new(field, Problem::InvalidEmail));
    }
    Ok(())
}

fn require_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require(field, value)?;
    match url::Url::parse(value.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(ValidationError::new(field, Problem::InvalidUrl)),
    }
}

/// Application for certification of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationApplication {
    pub project_name: String,
    /// Website or repository link.
    pub website: String,
    pub email: String,
    pub description: String,
    /// `None` until the applicant picks a date.
    pub launch_date: Option<NaiveDate>,
    pub agree_to_publish: bool,
}

impl SubmissionForm for CertificationApplication {
    fn validate_on(&self, today: NaiveDate) -> Result<(), ValidationError> {
        require("project_name", &self.project_name)?;
        require_url("website", &self.website)?;
        require_email("email", &self.email)?;
        require("description", &self.description)?;
        match self.launch_date {
            None => return Err(ValidationError::new("launch_date", Problem::Missing)),
            Some(date) if date < today => {
                return Err(ValidationError::new("launch_date", Problem::LaunchDateInPast));
            }
            Some(_) => {}
        }
        if !self.agree_to_publish {
            return Err(ValidationError::new(
                "agree_to_publish",
                Problem::ConsentRequired,
            ));
        }
        Ok(())
    }
}

/// Topic selected on the contact form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InquiryType {
    #[default]
    General,
    Prequalification,
    Partnership,
    Media,
}

impl InquiryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InquiryType::General => "general",
            InquiryType::Prequalification => "prequalification",
            InquiryType::Partnership => "partnership",
            InquiryType::Media => "media",
        }
    }
}

impl std::str::FromStr for InquiryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(InquiryType::General),
            "prequalification" => Ok(InquiryType::Prequalification),
            "partnership" => Ok(InquiryType::Partnership),
            "media" => Ok(InquiryType::Media),
            _ => Err(format!("Invalid inquiry type: {}", s)),
        }
    }
}

/// Message sent from the contact page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub organization: Option<String>,
    pub inquiry_type: InquiryType,
    pub message: String,
}

impl SubmissionForm for ContactMessage {
    fn validate_on(&self, _today: NaiveDate) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require_email("email", &self.email)?;
        require("message", &self.message)?;
        Ok(())
    }
}

/// Newsletter subscription from the resources page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterSignup {
    pub email: String,
}

impl SubmissionForm for NewsletterSignup {
    fn validate_on(&self, _today: NaiveDate) -> Result<(), ValidationError> {
        require_email("email", &self.email)
    }
}

/// Any of the site's forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum FormSubmission {
    CertificationApplication(CertificationApplication),
    ContactMessage(ContactMessage),
    NewsletterSignup(NewsletterSignup),
}

impl FormSubmission {
    pub fn validate_on(&self, today: NaiveDate) -> Result<(), ValidationError> {
        match self {
            FormSubmission::CertificationApplication(f) => f.validate_on(today),
            FormSubmission::ContactMessage(f) => f.validate_on(today),
            FormSubmission::NewsletterSignup(f) => f.validate_on(today),
        }
    }
}

impl From<CertificationApplication> for FormSubmission {
    fn from(f: CertificationApplication) -> Self {
        FormSubmission::CertificationApplication(f)
    }
}

impl From<ContactMessage> for FormSubmission {
    fn from(f: ContactMessage) -> Self {
        FormSubmission::ContactMessage(f)
    }
}

impl From<NewsletterSignup> for FormSubmission {
    fn from(f: NewsletterSignup) -> Self {
        FormSubmission::NewsletterSignup(f)
    }
}
