//! Test: round detection and cooldown in the drain loop

use crate::helpers::*;
use playbook_runner::core::descriptor::TestDescriptor;
use playbook_runner::core::results::ResultAccumulator;
use playbook_runner::execution::RunEvent;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;

/// A fixture where `A` cannot bind its params and `B` runs
fn binding_fixture() -> Fixture {
    let mut fixture = Fixture::new(vec![
        TestDescriptor::new("A").with_integrations(["Shared"]),
        TestDescriptor::new("B"),
    ]);
    fixture.secret.integrations = vec![
        secret_integration("Shared", Some("first"), json!({})),
        secret_integration("Shared", Some("second"), json!({})),
    ];
    fixture
}

/// [A (binding fails), B (succeeds)]: no descriptor repeats, no cooldown
#[tokio::test]
async fn test_distinct_queue_never_cools_down() {
    let fixture = binding_fixture();
    let client = Arc::new(ScriptedClient::new());
    let (runner, events) = runner_with_events(client.clone(), None);

    let queue: VecDeque<TestDescriptor> = fixture.conf.tests.clone().into();
    let mut results = ResultAccumulator::new();
    let stats = runner
        .drain_queue(&fixture.ctx(), &fixture.connection(), queue, &mut results)
        .await
        .unwrap();

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.cooldowns, 0);
    assert_eq!(results.failed, vec!["A"]);
    assert_eq!(results.succeeded, vec!["B"]);
    assert_eq!(client.checked(), vec!["B"]);

    let events = events.lock().unwrap();
    assert_eq!(
        count_events(&events, |e| matches!(e, RunEvent::RoundCompleted { .. })),
        0
    );
    assert_eq!(
        count_events(&events, |e| matches!(e, RunEvent::ParamsBindingFailed { .. })),
        1
    );
}

/// [A, A]: the repeat completes a round and cools down exactly once
#[tokio::test]
async fn test_repeated_descriptor_cools_down_once() {
    let fixture = Fixture::new(vec![TestDescriptor::new("A")]);
    let client = Arc::new(ScriptedClient::new());
    let (runner, events) = runner_with_events(client.clone(), None);

    let queue = VecDeque::from(vec![TestDescriptor::new("A"), TestDescriptor::new("A")]);
    let mut results = ResultAccumulator::new();
    let stats = runner
        .drain_queue(&fixture.ctx(), &fixture.connection(), queue, &mut results)
        .await
        .unwrap();

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.cooldowns, 1);

    let events = events.lock().unwrap();
    assert_eq!(
        count_events(&events, |e| matches!(e, RunEvent::RoundCompleted { .. })),
        1
    );
}

/// A round restarts after the cooldown: [A, B, A, B, A] cools down twice
#[tokio::test]
async fn test_round_restarts_after_cooldown() {
    let fixture = Fixture::new(vec![TestDescriptor::new("A"), TestDescriptor::new("B")]);
    let client = Arc::new(ScriptedClient::new());
    let (runner, _) = runner_with_events(client, None);

    let a = TestDescriptor::new("A");
    let b = TestDescriptor::new("B");
    let queue = VecDeque::from(vec![a.clone(), b.clone(), a.clone(), b, a]);
    let mut results = ResultAccumulator::new();
    let stats = runner
        .drain_queue(&fixture.ctx(), &fixture.connection(), queue, &mut results)
        .await
        .unwrap();

    // A repeats at index 2 (round 1), B at 3 is new in round 2, A at 4 repeats
    assert_eq!(stats.cooldowns, 2);
    assert_eq!(stats.processed, 5);
}

/// The cooldown event carries the configured pause
#[tokio::test]
async fn test_cooldown_event_reports_duration() {
    use playbook_runner::execution::TestRunner;
    use std::sync::Mutex;
    use std::time::Duration;

    let fixture = Fixture::new(vec![TestDescriptor::new("A")]);
    let mut runner = TestRunner::new(Arc::new(ScriptedClient::new()), None)
        .with_cooldown(Duration::from_millis(10));
    let cooldowns = Arc::new(Mutex::new(Vec::new()));
    let sink = cooldowns.clone();
    runner.add_event_handler(move |event| {
        if let RunEvent::RoundCompleted { cooldown_secs } = event {
            sink.lock().unwrap().push(cooldown_secs);
        }
    });

    let queue = VecDeque::from(vec![TestDescriptor::new("A"), TestDescriptor::new("A")]);
    let mut results = ResultAccumulator::new();
    runner
        .drain_queue(&fixture.ctx(), &fixture.connection(), queue, &mut results)
        .await
        .unwrap();

    assert_eq!(*cooldowns.lock().unwrap(), vec![0]);
}
