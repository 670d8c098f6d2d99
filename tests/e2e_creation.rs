// LogDeck - tests/e2e_creation.rs
//
// End-to-end tests for two-phase project creation: wizard definition ->
// CreationManager worker threads -> scripted API -> flow rollbacks.

mod common;

use common::{http_error, FakeApi};
use logdeck::app::creation::CreationManager;
use logdeck::core::creation::CreationPhase;
use logdeck::core::model::{CreationEvent, LogFormat, Step1Response};
use logdeck::core::wizard::{parse_definition, WizardSession, WizardStep};
use logdeck::util::error::CreationError;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// Helpers
// =============================================================================

fn nginx_session() -> WizardSession {
    let mut session = WizardSession::new();
    session.name = "nginx-logs".to_string();
    session.collection_path = "/var/log/nginx/*.log".to_string();
    session.set_log_format(LogFormat::Json);
    session
}

fn p1() -> Step1Response {
    Step1Response {
        project_id: "p1".to_string(),
        set_up_script_url: "https://setup.example.com/p1.sh".to_string(),
    }
}

/// Wait up to 5 s for the manager's in-flight request to finish.
fn next_event(manager: &mut CreationManager) -> CreationEvent {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let Some(event) = manager.wait(Duration::from_millis(50)) {
            return event;
        }
    }
    panic!("no creation event within 5 s (phase {})", manager.phase().name());
}

// =============================================================================
// Tests
// =============================================================================

/// Phase 2 fails with 500: back to download, project id kept, and the
/// message is about dashboard generation.
#[test]
fn e2e_phase2_failure_rolls_back_to_download() {
    let api = Arc::new(FakeApi::default());
    api.step1.lock().unwrap().push_back(Ok(p1()));
    api.step2
        .lock()
        .unwrap()
        .push_back(Err(http_error("/monitoring/log-project/step2", 500)));

    let mut manager = CreationManager::new(api.clone(), nginx_session());
    manager.submit().unwrap();
    assert_eq!(manager.phase().name(), "generating");

    let event = next_event(&mut manager);
    assert!(
        matches!(event, CreationEvent::ReadyToInstall { ref project_id, .. } if project_id == "p1"),
        "unexpected event {event:?}"
    );
    assert_eq!(manager.phase().name(), "download");

    manager.confirm_install().unwrap();
    assert_eq!(manager.phase().name(), "grafana-creating");
    let event = next_event(&mut manager);

    let CreationEvent::Failed(err) = event else {
        panic!("expected failure, got {event:?}");
    };
    assert!(matches!(err, CreationError::Phase2(_)));
    assert!(err.to_string().contains("Dashboard generation"));
    assert_eq!(manager.phase().name(), "download");
    assert_eq!(manager.phase().project_id(), Some("p1"));
    assert_eq!(api.count("step1"), 1);
    assert_eq!(api.calls().last().map(String::as_str), Some("step2 p1"));
}

/// Retry after a phase-2 failure does not repeat phase 1.
#[test]
fn e2e_phase2_retry_succeeds_without_redoing_phase1() {
    let api = Arc::new(FakeApi::default());
    api.step1.lock().unwrap().push_back(Ok(p1()));
    {
        let mut step2 = api.step2.lock().unwrap();
        step2.push_back(Err(http_error("/monitoring/log-project/step2", 502)));
        step2.push_back(Ok(()));
    }

    let mut manager = CreationManager::new(api.clone(), nginx_session());
    manager.submit().unwrap();
    next_event(&mut manager);
    manager.confirm_install().unwrap();
    assert!(matches!(next_event(&mut manager), CreationEvent::Failed(_)));

    manager.confirm_install().unwrap();
    let event = next_event(&mut manager);
    let CreationEvent::Succeeded { route } = event else {
        panic!("expected success, got {event:?}");
    };
    assert!(route.dashboard_creating);
    assert_eq!(
        *manager.phase(),
        CreationPhase::Success {
            project_id: "p1".to_string()
        }
    );
    assert_eq!(api.count("step1"), 1);
    assert_eq!(api.count("step2"), 2);
}

/// Phase 1 fails: back to the form with every entered value intact, and
/// resubmitting is possible.
#[test]
fn e2e_phase1_failure_returns_to_form() {
    let api = Arc::new(FakeApi::default());
    api.step1
        .lock()
        .unwrap()
        .push_back(Err(http_error("/monitoring/log-project/step1", 422)));
    api.step1.lock().unwrap().push_back(Ok(p1()));

    let mut manager = CreationManager::new(api.clone(), nginx_session());
    manager.submit().unwrap();
    let event = next_event(&mut manager);
    assert!(matches!(event, CreationEvent::Failed(CreationError::Phase1(_))));
    assert_eq!(*manager.phase(), CreationPhase::Form);

    let session = manager.session_mut().expect("form is editable");
    assert_eq!(session.name, "nginx-logs");
    assert_eq!(session.collection_path, "/var/log/nginx/*.log");

    manager.submit().unwrap();
    assert!(matches!(
        next_event(&mut manager),
        CreationEvent::ReadyToInstall { .. }
    ));
}

/// Missing required data: nothing is sent.
#[test]
fn e2e_missing_required_sends_nothing() {
    let api = Arc::new(FakeApi::default());
    let mut session = nginx_session();
    session.collection_path.clear();
    let mut manager = CreationManager::new(api.clone(), session);

    assert!(matches!(
        manager.submit(),
        Err(CreationError::MissingRequired(_))
    ));
    assert!(api.calls().is_empty());
    assert!(manager.flow().last_error().is_some());
}

/// Cancel from the install guide returns to the review step.
#[test]
fn e2e_cancel_from_download_returns_to_review() {
    let api = Arc::new(FakeApi::default());
    api.step1.lock().unwrap().push_back(Ok(p1()));
    let mut manager = CreationManager::new(api, nginx_session());
    manager.submit().unwrap();
    next_event(&mut manager);

    manager.cancel_to_form().unwrap();
    assert_eq!(*manager.phase(), CreationPhase::Form);
    assert_eq!(manager.flow().session().step(), WizardStep::Review);
}

/// A phase-2 response that arrives after shutdown never reaches the flow,
/// and the flow is not left waiting on it.
#[test]
fn e2e_shutdown_discards_late_response() {
    let api = Arc::new(FakeApi::default());
    api.step1.lock().unwrap().push_back(Ok(p1()));
    {
        let mut step2 = api.step2.lock().unwrap();
        step2.push_back(Ok(()));
        step2.push_back(Ok(()));
    }
    *api.step2_delay.lock().unwrap() = Duration::from_millis(150);

    let mut manager = CreationManager::new(api.clone(), nginx_session());
    manager.submit().unwrap();
    next_event(&mut manager);
    manager.confirm_install().unwrap();
    manager.shutdown();

    assert!(!manager.flow().is_busy());
    assert_eq!(manager.phase().name(), "download");
    assert_eq!(manager.phase().project_id(), Some("p1"));
    assert!(manager.wait(Duration::from_millis(50)).is_none());

    std::thread::sleep(Duration::from_millis(300));
    assert!(manager.poll_progress().is_empty());
    assert_eq!(manager.phase().name(), "download");
    assert_eq!(api.count("step2"), 1);

    // Retrying after teardown runs a fresh request.
    manager.confirm_install().unwrap();
    assert!(matches!(
        next_event(&mut manager),
        CreationEvent::Succeeded { .. }
    ));
    assert_eq!(api.count("step2"), 2);
}

/// A TOML wizard definition drives the whole flow and produces the
/// expected phase-1 request.
#[test]
fn e2e_definition_file_to_step1_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.toml");
    std::fs::write(
        &path,
        r#"
            name = "app-server"
            description = "Application logs"
            collection_path = "/srv/app/logs/*.log"
            format = "plainText"
            platform = "linux"

            [multiline]
            enabled = true

            [[fields]]
            name = "request_id"
            path = "req=([a-f0-9]+)"

            [[filters]]
            field = "level"
            operator = "NOT_EQUALS"
            value = "DEBUG"
        "#,
    )
    .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let mut session = parse_definition(&content, Path::new(&path))
        .unwrap()
        .into_session()
        .unwrap();
    while session.step() != WizardStep::Review {
        session.next_step().unwrap();
    }

    let api = Arc::new(FakeApi::default());
    api.step1.lock().unwrap().push_back(Ok(p1()));
    let mut manager = CreationManager::new(api.clone(), session);
    manager.submit().unwrap();
    next_event(&mut manager);

    let sent = api.step1_requests.lock().unwrap()[0].clone();
    assert_eq!(sent.project_name, "app-server");
    assert_eq!(sent.log_paths, vec!["/srv/app/logs/*.log".to_string()]);
    assert_eq!(sent.multiline_pattern, "^[0-9]{4}-[0-9]{2}-[0-9]{2}");
    assert!(sent.timestamp_field.is_empty());
    assert_eq!(
        sent.custom_plain_fields,
        vec!["timestamp", "level", "msg_detail", "request_id"]
    );
    assert_eq!(sent.filters.len(), 1);
    assert_eq!(sent.filters[0].value, "DEBUG");

    let json = serde_json::to_value(&sent).unwrap();
    assert_eq!(json["platform"], "linux");
    assert_eq!(json["filters"][0]["operator"], "NOT_EQUALS");
}
