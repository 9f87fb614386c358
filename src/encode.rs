//! Mapping of typed form models onto the relay's flat key/value payload.
//!
//! Each form model implements [`Encode`]. The wire keys are fixed, booleans
//! become `"Yes"`/`"No"`, and every payload gets a `form_type` tag plus a
//! human-readable timestamp. The timestamp is passed in so that encoding is a
//! pure function of its inputs.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::domain::{
    CertificationApplication, ContactMessage, FormKind, FormSubmission, NewsletterSignup,
};

/// Inbox that receives certification applications.
pub const APPLICATION_INBOX: &str = "contact@qverify.org";

/// Page the newsletter form is embedded in.
pub const NEWSLETTER_SOURCE: &str = "resources_page";

/// Wire value for a contact message without an organization.
pub const NO_ORGANIZATION: &str = "Not provided";

/// Flat, insertion-ordered string map sent to the relay as template parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WirePayload {
    entries: Vec<(String, String)>,
}

impl WirePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for WirePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WirePayload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut payload = WirePayload::new();
        for (k, v) in iter {
            payload.insert(k, v);
        }
        payload
    }
}

/// Format used for the submission/subscription timestamp fields.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

/// A form model that knows its wire representation.
pub trait Encode {
    /// Which form this is.
    fn kind(&self) -> FormKind;

    /// Encode into the relay payload, stamping it with `submitted_at`.
    fn encode(&self, submitted_at: DateTime<Utc>) -> WirePayload;
}

impl Encode for CertificationApplication {
    fn kind(&self) -> FormKind {
        FormKind::CertificationApplication
    }

    fn encode(&self, submitted_at: DateTime<Utc>) -> WirePayload {
        let launch_date = self
            .launch_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        let mut payload = WirePayload::new();
        payload.insert("project_name", self.project_name.trim());
        payload.insert("website", self.website.trim());
        payload.insert("contact_email", self.email.trim());
        payload.insert("description", self.description.trim());
        payload.insert("launch_date", launch_date);
        payload.insert("agree_to_publish", yes_no(self.agree_to_publish));
        payload.insert("form_type", self.kind().as_tag());
        payload.insert("submission_date", format_timestamp(submitted_at));
        payload.insert("to_email", APPLICATION_INBOX);
        payload
    }
}

impl Encode for ContactMessage {
    fn kind(&self) -> FormKind {
        FormKind::ContactMessage
    }

    fn encode(&self, submitted_at: DateTime<Utc>) -> WirePayload {
        let organization = self
            .organization
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(NO_ORGANIZATION);

        let mut payload = WirePayload::new();
        payload.insert("name", self.name.trim());
        payload.insert("email", self.email.trim());
        payload.insert("organization", organization);
        payload.insert("inquiry_type", self.inquiry_type.as_str());
        payload.insert("message", self.message.trim());
        payload.insert("form_type", self.kind().as_tag());
        payload.insert("submission_date", format_timestamp(submitted_at));
        payload
    }
}

impl Encode for NewsletterSignup {
    fn kind(&self) -> FormKind {
        FormKind::NewsletterSignup
    }

    fn encode(&self, submitted_at: DateTime<Utc>) -> WirePayload {
        let mut payload = WirePayload::new();
        payload.insert("email", self.email.trim());
        payload.insert("form_type", self.kind().as_tag());
        payload.insert("subscription_date", format_timestamp(submitted_at));
        payload.insert("source", NEWSLETTER_SOURCE);
        payload
    }
}

impl Encode for FormSubmission {
    fn kind(&self) -> FormKind {
        match self {
            FormSubmission::CertificationApplication(f) => f.kind(),
            FormSubmission::ContactMessage(f) => f.kind(),
            FormSubmission::NewsletterSignup(f) => f.kind(),
        }
    }

    fn encode(&self, submitted_at: DateTime<Utc>) -> WirePayload {
        match self {
            FormSubmission::CertificationApplication(f) => f.encode(submitted_at),
            FormSubmission::ContactMessage(f) => f.encode(submitted_at),
            FormSubmission::NewsletterSignup(f) => f.encode(submitted_at),
        }
    }
}
