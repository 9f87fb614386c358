//! Submission controller: probe, validate, encode, send, report.
//!
//! One controller drives one form. It owns the form draft the UI edits, the
//! channel status produced by the probe, and the single in-flight attempt.
//! The UI reads [`SubmissionController::state`] to decide what to render and
//! receives one [`Notification`] per finished attempt through its
//! [`NotificationSink`].
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use parking_lot::Mutex;

use crate::config::{ChannelConfig, ConfigSource, ControllerConfig};
use crate::delivery::DeliveryChannel;
use crate::domain::{AttemptId, ChannelStatus, FormKind, SubmissionForm, SubmissionOutcome};
use crate::error::{FormgateError, Result};
use crate::notify::{ManualFallback, Notification, NotificationSink};
use crate::probe::probe;

pub mod state;
pub mod transitions;

pub use state::{ControllerState, LastAttempt};

struct Inner<F> {
    state: ControllerState,
    channel: ChannelStatus,
    /// Credentials accepted by the last successful probe
    credentials: Option<ChannelConfig>,
    draft: F,
}

/// Restores the state and channel status captured before a probe or send
/// began, unless disarmed once the awaited work has finished.
///
/// Without it, a caller that drops the future mid-flight (a lost `select!`
/// branch or a timeout) would leave the controller in `Checking` or
/// `Submitting` for good.
struct Rollback<'a, F> {
    inner: &'a Mutex<Inner<F>>,
    state: Option<ControllerState>,
    channel: ChannelStatus,
}

impl<'a, F> Rollback<'a, F> {
    fn new(inner: &'a Mutex<Inner<F>>, current: &Inner<F>) -> Self {
        Self {
            inner,
            state: Some(current.state.clone()),
            channel: current.channel,
        }
    }

    fn disarm(mut self) {
        self.state = None;
    }
}

impl<F> Drop for Rollback<'_, F> {
    fn drop(&mut self) {
        // Never dropped while the controller lock is held
        if let Some(state) = self.state.take() {
            let mut inner = self.inner.lock();
            tracing::warn!(
                abandoned = %inner.state,
                restored = %state,
                "In-flight operation dropped before completion, state restored"
            );
            inner.state = state;
            inner.channel = self.channel;
        }
    }
}

/// Drives a single form through probe, submission and reporting.
///
/// Generic over the form model `F`, the configuration source `C`, the
/// delivery channel `D` and the notification sink `N`.
pub struct SubmissionController<F, C, D, N>
where
    F: SubmissionForm,
    C: ConfigSource,
    D: DeliveryChannel,
    N: NotificationSink,
{
    config_source: C,
    delivery: D,
    sink: Arc<N>,
    config: ControllerConfig,
    inner: Mutex<Inner<F>>,
}

impl<F, C, D, N> SubmissionController<F, C, D, N>
where
    F: SubmissionForm,
    C: ConfigSource,
    D: DeliveryChannel,
    N: NotificationSink,
{
    /// Create a controller in the `Init` state with an empty form.
    pub fn new(config_source: C, delivery: D, sink: N, config: ControllerConfig) -> Self {
        Self {
            config_source,
            delivery,
            sink: Arc::new(sink),
            config,
            inner: Mutex::new(Inner {
                state: ControllerState::Init,
                channel: ChannelStatus::Unknown,
                credentials: None,
                draft: F::default(),
            }),
        }
    }

    /// Run the initial probe. Only valid from `Init`.
    pub async fn start(&self) -> Result<ChannelStatus> {
        {
            let inner = self.inner.lock();
            if inner.state != ControllerState::Init {
                return Err(FormgateError::InvalidState(
                    inner.state.name().to_string(),
                    "checking".to_string(),
                ));
            }
        }
        self.run_probe().await
    }

    /// Re-run the probe at the user's request.
    ///
    /// A no-op returning [`ChannelStatus::Checking`] while a probe is already
    /// in flight.
    pub async fn retry_probe(&self) -> Result<ChannelStatus> {
        self.run_probe().await
    }

    async fn run_probe(&self) -> Result<ChannelStatus> {
        let rollback = {
            let mut inner = self.inner.lock();
            if inner.state.is_checking() {
                tracing::debug!("Probe already in flight, ignoring retry");
                return Ok(ChannelStatus::Checking);
            }
            let next = inner.state.begin_check()?;
            let rollback = Rollback::new(&self.inner, &inner);
            inner.state = next;
            inner.channel = ChannelStatus::Checking;
            rollback
        };

        tracing::debug!("Probing delivery channel configuration");
        let credentials = self.config_source.load().await;
        rollback.disarm();
        let status = probe(&credentials);

        let result = match status {
            ChannelStatus::Ready => "ready",
            _ => "misconfigured",
        };
        counter!("formgate_probes_total", "result" => result).increment(1);

        let mut inner = self.inner.lock();
        inner.state = inner.state.finish_check(status)?;
        inner.channel = status;
        inner.credentials = status.is_ready().then_some(credentials);

        match status {
            ChannelStatus::Misconfigured(field) => {
                tracing::warn!(
                    field = %field,
                    env_var = field.env_var(),
                    "Delivery channel misconfigured, submissions blocked"
                );
            }
            _ => tracing::info!("Delivery channel ready"),
        }

        Ok(status)
    }

    /// Submit the current form draft.
    ///
    /// - While blocked (or not yet probed) the attempt is refused and reported
    ///   as [`SubmissionOutcome::ChannelUnavailable`].
    /// - An invalid draft is rejected with [`FormgateError::Validation`]
    ///   before anything is encoded; no notification is emitted.
    /// - While another submission is in flight, returns
    ///   [`FormgateError::SubmissionInFlight`] without sending.
    ///
    /// Otherwise exactly one send happens and exactly one notification is
    /// emitted for its outcome.
    pub async fn submit(&self) -> Result<SubmissionOutcome> {
        let attempt_id = AttemptId::new();

        let (draft, credentials, rollback) = {
            let mut inner = self.inner.lock();
            let kind = inner.draft.kind();

            if inner.state.is_submitting() {
                tracing::debug!(attempt_id = %attempt_id, "Submission already in flight");
                return Err(FormgateError::SubmissionInFlight);
            }

            let ready_credentials = match inner.state {
                ControllerState::Idle(_) => inner.credentials.clone(),
                _ => None,
            };
            let Some(credentials) = ready_credentials else {
                tracing::warn!(
                    attempt_id = %attempt_id,
                    form = %kind,
                    state = %inner.state,
                    "Submission refused, delivery channel unavailable"
                );
                drop(inner);
                return Ok(self.report(attempt_id, kind, SubmissionOutcome::ChannelUnavailable));
            };

            inner.draft.validate()?;
            let next = inner.state.begin_submit(attempt_id)?;
            let rollback = Rollback::new(&self.inner, &inner);
            inner.state = next;
            (inner.draft.clone(), credentials, rollback)
        };

        let kind = draft.kind();
        tracing::info!(attempt_id = %attempt_id, form = %kind, "Submitting form");

        // Stamped at send time, not when the draft was last edited
        let payload = draft.encode(Utc::now());
        let outcome = self.delivery.send(&credentials, &payload).await;
        rollback.disarm();

        {
            let mut inner = self.inner.lock();
            inner.state = inner.state.finish_submit(&outcome)?;
            if outcome.is_success() {
                inner.draft = F::default();
            }
        }

        let outcome = self.report(attempt_id, kind, outcome);
        if outcome.is_success() {
            self.schedule_redirect(attempt_id);
        }
        Ok(outcome)
    }

    fn report(
        &self,
        attempt_id: AttemptId,
        kind: FormKind,
        outcome: SubmissionOutcome,
    ) -> SubmissionOutcome {
        counter!(
            "formgate_submissions_total",
            "form_type" => kind.as_str(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        match &outcome {
            SubmissionOutcome::Success => {
                tracing::info!(attempt_id = %attempt_id, form = %kind, "Submission delivered")
            }
            other => tracing::warn!(
                attempt_id = %attempt_id,
                form = %kind,
                outcome = ?other,
                "Submission failed"
            ),
        }

        let success_message = self
            .config
            .success_message
            .as_deref()
            .unwrap_or(kind.success_message());
        self.sink
            .notify(Notification::for_outcome(&outcome, success_message));
        outcome
    }

    fn schedule_redirect(&self, attempt_id: AttemptId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                attempt_id = %attempt_id,
                "No tokio runtime available, post-submission redirect skipped"
            );
            return;
        };
        let sink = self.sink.clone();
        let delay = Duration::from_millis(self.config.reset_delay_ms);
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!(attempt_id = %attempt_id, "Post-submission redirect");
            sink.redirect();
        });
    }

    /// Current controller state.
    pub fn state(&self) -> ControllerState {
        self.inner.lock().state.clone()
    }

    /// Channel status from the last probe.
    pub fn channel_status(&self) -> ChannelStatus {
        self.inner.lock().channel
    }

    /// Whether the UI should enable its submit action.
    pub fn can_submit(&self) -> bool {
        self.inner.lock().state.can_submit()
    }

    /// Direct-contact action, offered only while blocked.
    pub fn fallback(&self) -> Option<ManualFallback> {
        self.inner.lock().state.is_blocked().then(|| {
            ManualFallback::new(&self.config.fallback_address, &self.config.fallback_subject)
        })
    }

    /// Explanation for the blocked panel, naming what the operator must set.
    pub fn blocked_reason(&self) -> Option<String> {
        match self.inner.lock().state {
            ControllerState::Blocked(field) => Some(field.explanation()),
            _ => None,
        }
    }

    /// Copy of the current form draft.
    pub fn form(&self) -> F {
        self.inner.lock().draft.clone()
    }

    /// Edit the form draft in place.
    pub fn update_form(&self, edit: impl FnOnce(&mut F)) {
        edit(&mut self.inner.lock().draft);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfigSource;
    use crate::delivery::EmailRelayClient;
    use crate::domain::{ConfigField, ContactMessage, NewsletterSignup};
    use crate::http::{HttpResponse, MockHttpClient};
    use crate::notify::UiEvent;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

    type Controller<F> = SubmissionController<
        F,
        StaticConfigSource,
        EmailRelayClient<MockHttpClient>,
        UnboundedSender<UiEvent>,
    >;

    fn controller<F: SubmissionForm>(
        config: ChannelConfig,
    ) -> (Controller<F>, MockHttpClient, UnboundedReceiver<UiEvent>) {
        let mock = MockHttpClient::new();
        let (tx, rx) = unbounded_channel();
        let controller = SubmissionController::new(
            StaticConfigSource(config),
            EmailRelayClient::with_defaults(mock.clone()),
            tx,
            ControllerConfig::default(),
        );
        (controller, mock, rx)
    }

    fn ready_config() -> ChannelConfig {
        ChannelConfig::new("service_live", "template_contact", "pk_live")
    }

    #[tokio::test]
    async fn test_new_controller_is_init_and_unknown() {
        let (controller, _, _) = controller::<NewsletterSignup>(ready_config());
        assert_eq!(controller.state(), ControllerState::Init);
        assert_eq!(controller.channel_status(), ChannelStatus::Unknown);
        assert!(!controller.can_submit());
    }

    #[tokio::test]
    async fn test_start_resolves_to_ready() {
        let (controller, _, _) = controller::<NewsletterSignup>(ready_config());
        assert_eq!(controller.start().await.unwrap(), ChannelStatus::Ready);
        assert_eq!(controller.state(), ControllerState::Idle(None));
        assert!(controller.can_submit());
        assert!(controller.fallback().is_none());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (controller, _, _) = controller::<NewsletterSignup>(ready_config());
        controller.start().await.unwrap();
        assert!(matches!(
            controller.start().await,
            Err(FormgateError::InvalidState(..))
        ));
    }

    #[tokio::test]
    async fn test_blocked_controller_offers_fallback() {
        let (controller, _, _) = controller::<NewsletterSignup>(ChannelConfig::default());
        assert_eq!(
            controller.start().await.unwrap(),
            ChannelStatus::Misconfigured(ConfigField::Service)
        );

        let fallback = controller.fallback().unwrap();
        assert_eq!(fallback.address, "contact@qverify.org");
        assert!(
            controller
                .blocked_reason()
                .unwrap()
                .contains("EMAILJS_SERVICE_ID")
        );
    }

    #[tokio::test]
    async fn test_submit_before_start_reports_channel_unavailable() {
        let (controller, mock, mut rx) = controller::<NewsletterSignup>(ready_config());
        controller.update_form(|f| f.email = "reader@example.org".to_string());

        let outcome = controller.submit().await.unwrap();
        assert_eq!(outcome, SubmissionOutcome::ChannelUnavailable);
        assert_eq!(mock.call_count(), 0);
        assert!(matches!(
            rx.try_recv().unwrap(),
            UiEvent::Notify(Notification::Failure(_))
        ));
        assert_eq!(controller.state(), ControllerState::Init);
    }

    #[test]
    fn test_redirect_without_runtime_is_skipped() {
        let (controller, _, mut rx) = controller::<NewsletterSignup>(ready_config());
        controller.schedule_redirect(AttemptId::new());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_network_failure_keeps_draft() {
        let (controller, mock, mut rx) = controller::<ContactMessage>(ready_config());
        mock.add_response(
            "POST /api/v1.0/email/send",
            Err(FormgateError::Other(anyhow::anyhow!("connection refused"))),
        );
        controller.start().await.unwrap();
        controller.update_form(|f| {
            f.name = "Ada".to_string();
            f.email = "ada@example.org".to_string();
            f.message = "Hello".to_string();
        });
        let before = controller.form();

        let outcome = controller.submit().await.unwrap();
        assert_eq!(
            outcome,
            SubmissionOutcome::TransportError("network".to_string())
        );
        assert_eq!(controller.form(), before);
        assert_eq!(
            controller.state(),
            ControllerState::Idle(Some(LastAttempt::Failed(outcome)))
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            UiEvent::Notify(Notification::Failure(_))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resubmit_after_failure() {
        let (controller, mock, _rx) = controller::<NewsletterSignup>(ready_config());
        mock.add_response(
            "POST /api/v1.0/email/send",
            Ok(HttpResponse {
                status: 500,
                body: String::new(),
            }),
        );
        mock.add_response(
            "POST /api/v1.0/email/send",
            Ok(HttpResponse {
                status: 200,
                body: "OK".to_string(),
            }),
        );
        controller.start().await.unwrap();
        controller.update_form(|f| f.email = "reader@example.org".to_string());

        assert!(!controller.submit().await.unwrap().is_success());
        assert!(controller.submit().await.unwrap().is_success());
        assert_eq!(controller.form(), NewsletterSignup::default());
        assert_eq!(mock.call_count(), 2);
    }
}
