use chrono::{Days, Local};
use formgate::config::{ChannelConfig, ConfigSource, ControllerConfig, StaticConfigSource};
use formgate::controller::{ControllerState, LastAttempt, SubmissionController};
use formgate::delivery::EmailRelayClient;
use formgate::domain::{
    CertificationApplication, ChannelStatus, ConfigField, NewsletterSignup, Problem,
    SubmissionForm, SubmissionOutcome,
};
use formgate::error::FormgateError;
use formgate::http::{HttpResponse, MockHttpClient};
use formgate::notify::{Notification, UiEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::timeout;

const SEND: &str = "POST /api/v1.0/email/send";

type Controller<F, C> =
    SubmissionController<F, C, EmailRelayClient<MockHttpClient>, UnboundedSender<UiEvent>>;

fn live_config() -> ChannelConfig {
    ChannelConfig::new("service_live", "template_apply", "pk_live")
}

fn build<F: SubmissionForm, C: ConfigSource>(
    source: C,
) -> (Controller<F, C>, MockHttpClient, UnboundedReceiver<UiEvent>) {
    let mock = MockHttpClient::new();
    let (tx, rx) = unbounded_channel();
    let controller = SubmissionController::new(
        source,
        EmailRelayClient::with_defaults(mock.clone()),
        tx,
        ControllerConfig::default(),
    );
    (controller, mock, rx)
}

fn fill_application(form: &mut CertificationApplication) {
    form.project_name = "Lattice Wallet".to_string();
    form.website = "https://github.com/example/lattice-wallet".to_string();
    form.email = "team@lattice.example".to_string();
    form.description = "Post-quantum wallet built on ML-KEM and ML-DSA".to_string();
    form.launch_date = Local::now().date_naive().checked_add_days(Days::new(30));
    form.agree_to_publish = true;
}

fn drain(rx: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Config source whose value can be changed by the "operator" mid-test.
#[derive(Clone, Default)]
struct MutableSource(Arc<Mutex<ChannelConfig>>);

#[async_trait::async_trait]
impl ConfigSource for MutableSource {
    async fn load(&self) -> ChannelConfig {
        self.0.lock().clone()
    }
}

/// Config source that blocks until released, counting loads.
#[derive(Clone, Default)]
struct GatedSource {
    gate: Arc<Notify>,
    loads: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl ConfigSource for GatedSource {
    async fn load(&self) -> ChannelConfig {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        live_config()
    }
}

#[test_log::test(tokio::test)]
async fn test_application_delivered_resets_form() {
    let (controller, mock, mut rx) =
        build::<CertificationApplication, _>(StaticConfigSource(live_config()));
    mock.add_response(
        SEND,
        Ok(HttpResponse {
            status: 200,
            body: "OK".to_string(),
        }),
    );

    assert_eq!(controller.start().await.unwrap(), ChannelStatus::Ready);
    controller.update_form(fill_application);

    let outcome = controller.submit().await.unwrap();

    assert_eq!(outcome, SubmissionOutcome::Success);
    assert_eq!(
        controller.state(),
        ControllerState::Idle(Some(LastAttempt::Success))
    );
    assert_eq!(controller.form(), CertificationApplication::default());

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        UiEvent::Notify(Notification::Success(_))
    ));

    // The payload reached the relay with the expected template params
    let calls = mock.get_calls();
    assert_eq!(calls.len(), 1);
    let body: serde_json::Value = serde_json::from_str(&calls[0].body).unwrap();
    let params = &body["template_params"];
    assert_eq!(params["project_name"], "Lattice Wallet");
    assert_eq!(params["contact_email"], "team@lattice.example");
    assert_eq!(params["agree_to_publish"], "Yes");
    assert_eq!(params["to_email"], "contact@qverify.org");
    assert!(params["submission_date"].as_str().unwrap().ends_with("UTC"));
}

#[tokio::test(start_paused = true)]
async fn test_redirect_fires_once_after_reset_delay() {
    let (controller, mock, mut rx) =
        build::<NewsletterSignup, _>(StaticConfigSource(live_config()));
    mock.add_response(
        SEND,
        Ok(HttpResponse {
            status: 200,
            body: "OK".to_string(),
        }),
    );
    controller.start().await.unwrap();
    controller.update_form(|f| f.email = "reader@example.org".to_string());

    controller.submit().await.unwrap();
    assert!(matches!(
        rx.recv().await,
        Some(UiEvent::Notify(Notification::Success(_)))
    ));

    // Nothing before the delay elapses
    tokio::time::sleep(Duration::from_millis(2999)).await;
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(rx.recv().await, Some(UiEvent::Redirect));
    assert!(rx.try_recv().is_err());
}

#[test_log::test(tokio::test)]
async fn test_rejection_keeps_form_and_reports_server_message() {
    let (controller, mock, mut rx) =
        build::<CertificationApplication, _>(StaticConfigSource(live_config()));
    mock.add_response(
        SEND,
        Ok(HttpResponse {
            status: 429,
            body: r#"{"error": "quota exceeded"}"#.to_string(),
        }),
    );

    controller.start().await.unwrap();
    controller.update_form(fill_application);
    let entered = controller.form();

    let outcome = controller.submit().await.unwrap();

    assert_eq!(
        outcome,
        SubmissionOutcome::TransportError("quota exceeded".to_string())
    );
    assert_eq!(controller.form(), entered);
    assert_eq!(
        controller.state(),
        ControllerState::Idle(Some(LastAttempt::Failed(outcome)))
    );

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![UiEvent::Notify(Notification::Failure(
            "quota exceeded".to_string()
        ))]
    );
}

#[test_log::test(tokio::test)]
async fn test_placeholder_template_blocks_until_fixed() {
    let source = MutableSource::default();
    *source.0.lock() = ChannelConfig {
        template_id: formgate::config::PLACEHOLDER_TEMPLATE_ID.to_string(),
        ..live_config()
    };
    let (controller, mock, mut rx) = build::<NewsletterSignup, _>(source.clone());
    mock.add_response(
        SEND,
        Ok(HttpResponse {
            status: 200,
            body: "OK".to_string(),
        }),
    );

    assert_eq!(
        controller.start().await.unwrap(),
        ChannelStatus::Misconfigured(ConfigField::Template)
    );
    assert_eq!(
        controller.state(),
        ControllerState::Blocked(ConfigField::Template)
    );
    assert!(!controller.can_submit());
    assert_eq!(
        controller.fallback().unwrap().mailto_uri(),
        "mailto:contact@qverify.org?subject=Certification%20Application"
    );

    // A submit while blocked is refused, reported, and never sent
    controller.update_form(|f| f.email = "reader@example.org".to_string());
    assert_eq!(
        controller.submit().await.unwrap(),
        SubmissionOutcome::ChannelUnavailable
    );
    assert_eq!(mock.call_count(), 0);
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [UiEvent::Notify(Notification::Failure(_))]
    ));

    // Retrying without a fix reports the same reason
    assert_eq!(
        controller.retry_probe().await.unwrap(),
        ChannelStatus::Misconfigured(ConfigField::Template)
    );

    *source.0.lock() = live_config();
    assert_eq!(controller.retry_probe().await.unwrap(), ChannelStatus::Ready);
    assert!(controller.can_submit());
    assert!(controller.fallback().is_none());

    assert_eq!(controller.submit().await.unwrap(), SubmissionOutcome::Success);
    assert_eq!(mock.call_count(), 1);
}

#[test_log::test(tokio::test)]
async fn test_empty_newsletter_email_never_sent() {
    let (controller, mock, mut rx) =
        build::<NewsletterSignup, _>(StaticConfigSource(live_config()));
    controller.start().await.unwrap();

    let err = controller.submit().await.unwrap_err();

    match err {
        FormgateError::Validation(e) => {
            assert_eq!(e.field, "email");
            assert_eq!(e.problem, Problem::Missing);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(mock.call_count(), 0);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(controller.state(), ControllerState::Idle(None));
}

#[test_log::test(tokio::test)]
async fn test_second_submit_while_in_flight_is_refused() {
    let (controller, mock, mut rx) =
        build::<NewsletterSignup, _>(StaticConfigSource(live_config()));
    let trigger = mock.add_response_with_trigger(
        SEND,
        Ok(HttpResponse {
            status: 200,
            body: "OK".to_string(),
        }),
    );
    let controller = Arc::new(controller);
    controller.start().await.unwrap();
    controller.update_form(|f| f.email = "reader@example.org".to_string());

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });

    while mock.in_flight_count() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(controller.state().is_submitting());
    assert!(!controller.can_submit());

    assert!(matches!(
        controller.submit().await,
        Err(FormgateError::SubmissionInFlight)
    ));

    trigger.send(()).unwrap();
    assert_eq!(first.await.unwrap().unwrap(), SubmissionOutcome::Success);

    assert_eq!(mock.call_count(), 1);
    let notifications = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, UiEvent::Notify(_)))
        .count();
    assert_eq!(notifications, 1);
}

#[test_log::test(tokio::test)]
async fn test_retry_while_checking_is_noop() {
    let source = GatedSource::default();
    let (controller, _mock, _rx) = build::<NewsletterSignup, _>(source.clone());
    let controller = Arc::new(controller);

    let start = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start().await }
    });

    while source.loads.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(controller.state(), ControllerState::Checking);
    assert_eq!(controller.channel_status(), ChannelStatus::Checking);

    assert_eq!(
        controller.retry_probe().await.unwrap(),
        ChannelStatus::Checking
    );
    assert_eq!(source.loads.load(Ordering::SeqCst), 1);

    source.gate.notify_one();
    assert_eq!(start.await.unwrap().unwrap(), ChannelStatus::Ready);
    assert_eq!(controller.state(), ControllerState::Idle(None));
}

#[test_log::test(tokio::test)]
async fn test_submit_while_checking_is_refused() {
    let source = GatedSource::default();
    let (controller, mock, mut rx) = build::<NewsletterSignup, _>(source.clone());
    let controller = Arc::new(controller);
    controller.update_form(|f| f.email = "reader@example.org".to_string());

    let start = tokio::spawn({
        let controller = controller.clone();
        async move { controller.start().await }
    });
    while source.loads.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_eq!(
        controller.submit().await.unwrap(),
        SubmissionOutcome::ChannelUnavailable
    );
    assert_eq!(mock.call_count(), 0);
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [UiEvent::Notify(Notification::Failure(_))]
    ));
    assert_eq!(controller.state(), ControllerState::Checking);

    source.gate.notify_one();
    assert_eq!(start.await.unwrap().unwrap(), ChannelStatus::Ready);
    assert_eq!(
        controller.form().email,
        "reader@example.org",
        "a refused submit keeps the draft"
    );
}

#[test_log::test(tokio::test)]
async fn test_retry_while_submitting_is_invalid_state() {
    let (controller, mock, _rx) = build::<NewsletterSignup, _>(StaticConfigSource(live_config()));
    let trigger = mock.add_response_with_trigger(
        SEND,
        Ok(HttpResponse {
            status: 200,
            body: "OK".to_string(),
        }),
    );
    let controller = Arc::new(controller);
    controller.start().await.unwrap();
    controller.update_form(|f| f.email = "reader@example.org".to_string());

    let submit = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    while mock.in_flight_count() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(matches!(
        controller.retry_probe().await,
        Err(FormgateError::InvalidState(..))
    ));
    assert!(controller.state().is_submitting());

    trigger.send(()).unwrap();
    assert_eq!(submit.await.unwrap().unwrap(), SubmissionOutcome::Success);
}

#[test_log::test(tokio::test)]
async fn test_abandoned_probe_leaves_controller_usable() {
    let source = GatedSource::default();
    let (controller, _mock, _rx) = build::<NewsletterSignup, _>(source.clone());

    assert!(
        timeout(Duration::from_millis(10), controller.start())
            .await
            .is_err()
    );
    assert_eq!(controller.state(), ControllerState::Init);
    assert_eq!(controller.channel_status(), ChannelStatus::Unknown);

    // Let the next load through immediately
    source.gate.notify_one();
    assert_eq!(controller.start().await.unwrap(), ChannelStatus::Ready);
    assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    assert!(controller.can_submit());
}

#[test_log::test(tokio::test)]
async fn test_abandoned_submit_leaves_controller_usable() {
    let (controller, mock, mut rx) =
        build::<NewsletterSignup, _>(StaticConfigSource(live_config()));
    // Held for the whole test so the first send never completes
    let _stalled = mock.add_response_with_trigger(
        SEND,
        Ok(HttpResponse {
            status: 200,
            body: "OK".to_string(),
        }),
    );
    mock.add_response(
        SEND,
        Ok(HttpResponse {
            status: 200,
            body: "OK".to_string(),
        }),
    );
    controller.start().await.unwrap();
    controller.update_form(|f| f.email = "reader@example.org".to_string());

    assert!(
        timeout(Duration::from_millis(10), controller.submit())
            .await
            .is_err()
    );
    assert_eq!(controller.state(), ControllerState::Idle(None));
    assert!(controller.can_submit());
    assert_eq!(controller.form().email, "reader@example.org");
    assert!(drain(&mut rx).is_empty());

    assert_eq!(controller.submit().await.unwrap(), SubmissionOutcome::Success);
    assert_eq!(mock.call_count(), 2);
    assert_eq!(controller.retry_probe().await.unwrap(), ChannelStatus::Ready);
}
