//! Probe-gated delivery of website form submissions.
//!
//! The site's forms (certification application, contact message, newsletter
//! signup) are delivered through an external email-relay service. Before a
//! form can be submitted, its controller probes the relay configuration; a
//! misconfigured channel blocks submission and offers a direct-contact
//! fallback instead. Each submission is validated, encoded to the relay's flat
//! payload, sent once, and its classified outcome is reported to the UI layer
//! as a single notification.

pub mod config;
pub mod controller;
pub mod delivery;
pub mod domain;
pub mod encode;
pub mod error;
pub mod http;
pub mod notify;
pub mod probe;

// Re-export commonly used types
pub use config::{
    ChannelConfig, ConfigSource, ControllerConfig, DeliveryConfig, EnvConfigSource,
    StaticConfigSource,
};
pub use controller::{ControllerState, LastAttempt, SubmissionController};
pub use delivery::{DeliveryChannel, EmailRelayClient};
pub use domain::*;
pub use encode::{Encode, WirePayload};
pub use error::{FormgateError, Result};
pub use http::{HttpClient, HttpRequest, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use notify::{ManualFallback, Notification, NotificationSink, UiEvent};
pub use probe::probe;
