//! Test: failed playbooks, notifications and fatal errors

use crate::helpers::*;
use playbook_runner::core::descriptor::TestDescriptor;
use playbook_runner::execution::RunEvent;
use playbook_runner::server::{CheckOutcome, ClientError, PlaybookStatus};
use std::sync::Arc;

/// A failed status fails the test and notifies with the incident
#[tokio::test]
async fn test_failed_status_notifies_with_incident() {
    let fixture = Fixture::new(vec![TestDescriptor::new("A"), TestDescriptor::new("B")]);
    let client = Arc::new(ScriptedClient::new().with_outcome(
        "A",
        Ok(CheckOutcome::new(PlaybookStatus::Failed).with_incident("42")),
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    let result = run_worker(&fixture, client, Some(notifier.clone())).await;

    assert!(result.outcome.is_ok());
    assert_eq!(result.keeper.results.failed, vec!["A (Mock Disabled)"]);
    assert_eq!(result.keeper.results.succeeded, vec!["B"]);

    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].playbook_id, "A");
    assert_eq!(notices[0].incident_id.as_deref(), Some("42"));
    assert_eq!(notices[0].server_url, SERVER_URL);
    assert_eq!(notices[0].build_number, "1234");
    assert!(notices[0].text().ends_with("/#/WorkPlan/42"));

    assert_classified_once(&result.keeper, &["A", "B"]);
}

/// Non-terminal statuses count as failures too
#[tokio::test]
async fn test_in_progress_is_a_failure() {
    let fixture = Fixture::new(vec![TestDescriptor::new("Slow")]);
    let client = Arc::new(ScriptedClient::new().with_status("Slow", PlaybookStatus::InProgress));

    let result = run_worker(&fixture, client, None).await;

    assert_eq!(result.keeper.results.failed, vec!["Slow (Mock Disabled)"]);
}

/// The server skipping an unsupported playbook is a pass
#[tokio::test]
async fn test_not_supported_version_passes() {
    let fixture = Fixture::new(vec![TestDescriptor::new("Old")]);
    let client = Arc::new(
        ScriptedClient::new().with_status("Old", PlaybookStatus::NotSupportedVersion),
    );

    let result = run_worker(&fixture, client, None).await;

    assert_eq!(result.keeper.results.succeeded, vec!["Old"]);
    assert_eq!(
        count_events(&result.events, |e| matches!(
            e,
            RunEvent::TestPassed {
                status: PlaybookStatus::NotSupportedVersion,
                ..
            }
        )),
        1
    );
}

/// API and timeout errors fail only the test they happened in
#[tokio::test]
async fn test_client_errors_fail_the_test() {
    let fixture = Fixture::new(vec![
        TestDescriptor::new("A"),
        TestDescriptor::new("B"),
        TestDescriptor::new("C"),
    ]);
    let client = Arc::new(
        ScriptedClient::new()
            .with_outcome("A", Err(ClientError::api("instance creation failed")))
            .with_outcome("B", Err(ClientError::timeout(30))),
    );

    let result = run_worker(&fixture, client.clone(), None).await;

    assert!(result.outcome.is_ok());
    assert_eq!(client.checked(), vec!["A", "B", "C"]);
    assert_eq!(
        result.keeper.results.failed,
        vec!["A (Mock Disabled)", "B (Mock Disabled)"]
    );
    assert_eq!(result.keeper.results.succeeded, vec!["C"]);

    let errors: Vec<String> = result
        .events
        .iter()
        .filter_map(|e| match e {
            RunEvent::TestFailed { error, .. } => error.clone(),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].contains("instance creation failed"));
}

/// Local runs never notify
#[tokio::test]
async fn test_local_run_does_not_notify() {
    let mut fixture = Fixture::new(vec![TestDescriptor::new("A")]);
    fixture.settings.server = Some(SERVER_URL.to_string());
    let client = Arc::new(ScriptedClient::new().with_status("A", PlaybookStatus::Failed));
    let notifier = Arc::new(RecordingNotifier::default());

    let result = run_worker(&fixture, client, Some(notifier.clone())).await;

    assert_eq!(result.keeper.results.failed, vec!["A (Mock Disabled)"]);
    assert!(notifier.notices().is_empty());
}

/// An internal error aborts the worker but keeps what it already collected
#[tokio::test]
async fn test_internal_error_aborts_worker() {
    let fixture = Fixture::new(vec![
        TestDescriptor::new("A"),
        TestDescriptor::new("B"),
        TestDescriptor::new("C"),
    ]);
    let client = Arc::new(
        ScriptedClient::new().with_outcome("B", Err(ClientError::internal("check tool missing"))),
    );

    let result = run_worker(&fixture, client.clone(), None).await;

    let error = result.outcome.unwrap_err();
    assert!(!error.is_test_failure());
    assert_eq!(client.checked(), vec!["A", "B"]);

    let results = &result.keeper.results;
    assert_eq!(results.succeeded, vec!["A"]);
    assert_eq!(results.failed, vec!["~~ Thread 1 failed ~~"]);
    assert_eq!(results.tested_count(), 1);
    assert_eq!(
        count_events(&result.events, |e| matches!(
            e,
            RunEvent::ThreadFailed { thread_index: 0, .. }
        )),
        1
    );
}

/// Telemetry setup failing is fatal before any test runs
#[tokio::test]
async fn test_setup_error_is_fatal() {
    let fixture = Fixture::new(vec![TestDescriptor::new("A")]);
    let client = Arc::new(
        ScriptedClient::new().failing_telemetry(ClientError::transport("connection refused")),
    );

    let result = run_worker(&fixture, client.clone(), None).await;

    assert!(result.outcome.is_err());
    assert_eq!(client.telemetry_calls(), 1);
    assert_eq!(client.disable_calls(), 0);
    assert!(client.checked().is_empty());
    assert_eq!(result.keeper.results.failed, vec!["~~ Thread 1 failed ~~"]);
}

/// Integrations are disabled once per worker before the first test
#[tokio::test]
async fn test_worker_setup_runs_once() {
    let fixture = Fixture::new(vec![TestDescriptor::new("A"), TestDescriptor::new("B")]);
    let client = Arc::new(ScriptedClient::new());

    run_worker(&fixture, client.clone(), None).await;

    assert_eq!(client.telemetry_calls(), 1);
    assert_eq!(client.disable_calls(), 1);
}

/// An `error` status from the check tool fails one test; the queue goes on
#[tokio::test]
async fn test_error_status_fails_only_that_test() {
    let fixture = Fixture::new(vec![TestDescriptor::new("A"), TestDescriptor::new("B")]);
    let errored: CheckOutcome = serde_json::from_str(r#"{"status": "error"}"#).unwrap();
    let client = Arc::new(ScriptedClient::new().with_outcome("A", Ok(errored)));

    let result = run_worker(&fixture, client.clone(), None).await;

    assert!(result.outcome.is_ok());
    assert_eq!(client.checked(), vec!["A", "B"]);
    assert_eq!(result.keeper.results.failed, vec!["A (Mock Disabled)"]);
    assert_eq!(result.keeper.results.succeeded, vec!["B"]);
    assert_classified_once(&result.keeper, &["A", "B"]);
}
