//! Delivery of encoded payloads to the email relay.
//!
//! A send is a single best-effort request. Whatever happens is folded into a
//! [`SubmissionOutcome`]: no response at all becomes
//! `TransportError("network")`, a rejection carries the relay's own message
//! when it gave one, and anything accepted is `Success`.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{ChannelConfig, DeliveryConfig};
use crate::domain::SubmissionOutcome;
use crate::encode::WirePayload;
use crate::error::Result;
use crate::http::{HttpClient, HttpRequest, HttpResponse};

/// Message used when the relay rejects a payload without saying why.
pub const GENERIC_REJECTION: &str = "Failed to submit form";

/// Longest plain-text rejection body shown to the user as-is.
const MAX_PLAIN_TEXT_CHARS: usize = 200;

/// A channel that can deliver an encoded payload.
///
/// `credentials` are the values the controller's last probe accepted.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, credentials: &ChannelConfig, payload: &WirePayload) -> SubmissionOutcome;
}

/// Body of a relay send request.
#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: &'a WirePayload,
}

/// Client for the email-relay service's REST send endpoint.
#[derive(Debug, Clone)]
pub struct EmailRelayClient<H: HttpClient> {
    http_client: H,
    config: DeliveryConfig,
}

impl<H: HttpClient> EmailRelayClient<H> {
    pub fn new(http_client: H, config: DeliveryConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn with_defaults(http_client: H) -> Self {
        Self::new(http_client, DeliveryConfig::default())
    }

    fn build_request(
        &self,
        credentials: &ChannelConfig,
        payload: &WirePayload,
    ) -> Result<HttpRequest> {
        let body = serde_json::to_string(&RelayRequest {
            service_id: &credentials.service_id,
            template_id: &credentials.template_id,
            user_id: &credentials.public_key,
            template_params: payload,
        })?;

        Ok(HttpRequest {
            method: "POST".to_string(),
            endpoint: self.config.endpoint.clone(),
            path: self.config.send_path.clone(),
            body,
            timeout_ms: self.config.timeout_ms,
        })
    }
}

#[async_trait]
impl<H: HttpClient> DeliveryChannel for EmailRelayClient<H> {
    async fn send(&self, credentials: &ChannelConfig, payload: &WirePayload) -> SubmissionOutcome {
        let request = match self.build_request(credentials, payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build relay request");
                return SubmissionOutcome::TransportError(GENERIC_REJECTION.to_string());
            }
        };

        classify(self.http_client.execute(&request).await)
    }
}

/// Turn the raw transport result into a classified outcome.
pub fn classify(result: Result<HttpResponse>) -> SubmissionOutcome {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Relay unreachable");
            return SubmissionOutcome::TransportError(SubmissionOutcome::NETWORK.to_string());
        }
    };

    let body_error = json_field(&response.body, "error");

    if response.is_success() && body_error.is_none() {
        tracing::debug!(status = response.status, "Relay accepted payload");
        return SubmissionOutcome::Success;
    }

    let message = body_error
        .or_else(|| json_field(&response.body, "message"))
        .or_else(|| plain_text(&response.body))
        .unwrap_or_else(|| GENERIC_REJECTION.to_string());

    tracing::warn!(
        status = response.status,
        message = %message,
        "Relay rejected payload"
    );

    SubmissionOutcome::TransportError(message)
}

/// Non-empty string field of a JSON object body.
fn json_field(body: &str, field: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get(field)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A short plain-text body, trimmed. Markup (a proxy's error page) and
/// oversized bodies are not user-facing messages.
fn plain_text(body: &str) -> Option<String> {
    let text = body.trim();
    if text.is_empty()
        || text.starts_with('<')
        || text.chars().count() > MAX_PLAIN_TEXT_CHARS
        || serde_json::from_str::<serde_json::Value>(text).is_ok()
    {
        return None;
    }
    Some(text.to_string())
}
