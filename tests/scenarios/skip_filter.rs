//! Test: skip decisions while draining a worker's queue

use crate::helpers::*;
use playbook_runner::core::config::TestFilter;
use playbook_runner::core::descriptor::TestDescriptor;
use playbook_runner::core::results::SkipReason;
use playbook_runner::execution::RunEvent;
use std::collections::BTreeMap;
use std::sync::Arc;

fn reasons(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Every skip rule, one test each, next to a test that runs
#[tokio::test]
async fn test_each_skip_rule_is_recorded_with_reason() {
    let mut fixture = Fixture::new(vec![
        TestDescriptor::new("Runs"),
        TestDescriptor::new("Bad"),
        TestDescriptor::new("NeedsBroken").with_integrations(["Broken"]),
        TestDescriptor::new("TooNew").with_versions("6.0.0", "99.99.99"),
    ]);
    fixture.conf.skipped_tests = reasons(&[("Bad", "Issue 1234")]);
    fixture.conf.skipped_integrations = reasons(&[("Broken", "license expired")]);

    let client = Arc::new(ScriptedClient::new());
    let result = run_worker(&fixture, client.clone(), None).await;

    assert!(result.outcome.is_ok());
    assert_eq!(client.checked(), vec!["Runs"]);

    let results = &result.keeper.results;
    assert_eq!(results.succeeded, vec!["Runs"]);
    assert!(results.failed.is_empty());

    let skipped: Vec<String> = results.skipped.iter().map(ToString::to_string).collect();
    assert_eq!(
        skipped,
        vec![
            "Bad - reason: Issue 1234",
            "NeedsBroken - reason: skipped integration(s): Broken",
            "TooNew - reason: version mismatch (test versions: 6.0.0-99.99.99)",
        ]
    );
    assert!(results
        .skipped_integrations
        .contains("Broken - reason: license expired"));

    assert_classified_once(&result.keeper, &["Runs", "Bad", "NeedsBroken", "TooNew"]);
}

/// A configured filter skips everything it does not list
#[tokio::test]
async fn test_filter_file_limits_tests() {
    let mut fixture = Fixture::new(vec![TestDescriptor::new("A"), TestDescriptor::new("B")]);
    fixture.filter = TestFilter::new(["B"]);

    let client = Arc::new(ScriptedClient::new());
    let result = run_worker(&fixture, client.clone(), None).await;

    assert_eq!(client.checked(), vec!["B"]);
    assert_eq!(result.keeper.results.skipped[0].reason, SkipReason::Filtered);
    assert_classified_once(&result.keeper, &["A", "B"]);
}

/// The run-all marker in the filter file disables filtering
#[tokio::test]
async fn test_run_all_tests_marker() {
    let mut fixture = Fixture::new(vec![TestDescriptor::new("A"), TestDescriptor::new("B")]);
    fixture.filter = TestFilter::new(["Run all tests", "B"]);

    let client = Arc::new(ScriptedClient::new());
    run_worker(&fixture, client.clone(), None).await;

    assert_eq!(client.checked(), vec!["A", "B"]);
}

/// Version bounds are inclusive and compared loosely
#[tokio::test]
async fn test_version_gate_against_server_version() {
    let tests = vec![TestDescriptor::new("Ranged").with_versions("1.0.0", "2.0.0")];

    let mut inside = Fixture::new(tests.clone());
    inside.server_numeric_version = "1.5.0".to_string();
    let client = Arc::new(ScriptedClient::new());
    let result = run_worker(&inside, client.clone(), None).await;
    assert_eq!(result.keeper.results.succeeded, vec!["Ranged"]);

    let mut outside = Fixture::new(tests.clone());
    outside.server_numeric_version = "2.1.0".to_string();
    let client = Arc::new(ScriptedClient::new());
    let result = run_worker(&outside, client.clone(), None).await;
    assert!(client.checked().is_empty());
    assert!(matches!(
        result.keeper.results.skipped[0].reason,
        SkipReason::VersionMismatch { .. }
    ));

    let mut upper_bound = Fixture::new(tests);
    upper_bound.server_numeric_version = "2.0.0".to_string();
    let client = Arc::new(ScriptedClient::new());
    run_worker(&upper_bound, client.clone(), None).await;
    assert_eq!(client.checked(), vec!["Ranged"]);
}

/// Skips are reported as events, and skipped tests get no start marker
#[tokio::test]
async fn test_skip_events() {
    let mut fixture = Fixture::new(vec![TestDescriptor::new("Bad")]);
    fixture.conf.skipped_tests = reasons(&[("Bad", "flaky")]);

    let result = run_worker(&fixture, Arc::new(ScriptedClient::new()), None).await;

    assert_eq!(
        count_events(&result.events, |e| matches!(e, RunEvent::TestSkipped { .. })),
        1
    );
    assert_eq!(
        count_events(&result.events, |e| matches!(e, RunEvent::TestStarted { .. })),
        0
    );
}

/// The test list narrows the queue to the named tests
#[tokio::test]
async fn test_tests_list_selects_tests() {
    let mut fixture = Fixture::new(vec![
        TestDescriptor::new("A"),
        TestDescriptor::new("B"),
        TestDescriptor::new("C"),
    ]);
    fixture.settings.tests_list = Some(vec!["C".to_string(), "A".to_string()]);

    let client = Arc::new(ScriptedClient::new());
    let result = run_worker(&fixture, client.clone(), None).await;

    assert_eq!(client.checked(), vec!["A", "C"]);
    assert_eq!(result.keeper.results.tested_count(), 2);
}
