//! Test utility functions for playbook-runner scenarios

use async_trait::async_trait;
use playbook_runner::core::config::{ContentConf, SecretConf, SecretIntegration, TestFilter};
use playbook_runner::core::descriptor::TestDescriptor;
use playbook_runner::core::results::TestsDataKeeper;
use playbook_runner::core::settings::ExecutionSettings;
use playbook_runner::execution::{DrainStats, RunContext, RunEvent, TestRunner};
use playbook_runner::notify::{FailedTestNotice, FailureNotifier, NotifyError};
use playbook_runner::server::{
    CheckOutcome, CheckRequest, ClientError, PlaybookStatus, ServerClient, ServerConnection,
};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SERVER_URL: &str = "https://10.0.0.1";

/// Server client returning scripted outcomes per playbook
///
/// Playbooks without a script complete successfully.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Result<CheckOutcome, ClientError>>>>,
    checks: Mutex<Vec<CheckRequest>>,
    telemetry_calls: AtomicUsize,
    disable_calls: AtomicUsize,
    telemetry_error: Option<ClientError>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(self, playbook_id: &str, outcome: Result<CheckOutcome, ClientError>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(playbook_id.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn with_status(self, playbook_id: &str, status: PlaybookStatus) -> Self {
        self.with_outcome(playbook_id, Ok(CheckOutcome::new(status)))
    }

    pub fn failing_telemetry(mut self, error: ClientError) -> Self {
        self.telemetry_error = Some(error);
        self
    }

    /// Playbook ids in the order they were checked
    pub fn checked(&self) -> Vec<String> {
        self.checks
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.playbook_id.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<CheckRequest> {
        self.checks.lock().unwrap().clone()
    }

    pub fn telemetry_calls(&self) -> usize {
        self.telemetry_calls.load(Ordering::SeqCst)
    }

    pub fn disable_calls(&self) -> usize {
        self.disable_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerClient for ScriptedClient {
    async fn turn_off_telemetry(&self, _server: &ServerConnection) -> Result<(), ClientError> {
        self.telemetry_calls.fetch_add(1, Ordering::SeqCst);
        match &self.telemetry_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn disable_all_integrations(&self, _server: &ServerConnection) -> Result<(), ClientError> {
        self.disable_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn check_integration(&self, request: &CheckRequest) -> Result<CheckOutcome, ClientError> {
        self.checks.lock().unwrap().push(request.clone());
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&request.playbook_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(CheckOutcome::new(PlaybookStatus::Completed)))
    }
}

/// Notifier that keeps every notice
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<FailedTestNotice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<FailedTestNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl FailureNotifier for RecordingNotifier {
    async fn notify_failed_test(&self, notice: &FailedTestNotice) -> Result<(), NotifyError> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Settings of a CI (non-local) run
pub fn ci_settings() -> ExecutionSettings {
    ExecutionSettings {
        api_key: "api-key".to_string(),
        server: None,
        conf_path: PathBuf::from("conf.json"),
        secret_conf_path: None,
        nightly: false,
        slack_token: "slack-token".to_string(),
        circleci_token: "circle-token".to_string(),
        build_number: "1234".to_string(),
        build_name: "Private".to_string(),
        service_account: None,
        is_ami: true,
        mem_check: false,
        server_version: "Demisto Marketplace".to_string(),
        tests_list: None,
    }
}

pub fn secret_integration(name: &str, instance_name: Option<&str>, params: serde_json::Value) -> SecretIntegration {
    SecretIntegration {
        name: name.to_string(),
        instance_name: instance_name.map(str::to_string),
        params: params.as_object().cloned().unwrap_or_default(),
        byoi: None,
        validate_test: None,
    }
}

/// Everything a worker reads, owned in one place
pub struct Fixture {
    pub settings: ExecutionSettings,
    pub conf: ContentConf,
    pub secret: SecretConf,
    pub filter: TestFilter,
    pub server_numeric_version: String,
}

impl Fixture {
    pub fn new(tests: Vec<TestDescriptor>) -> Self {
        Self {
            settings: ci_settings(),
            conf: ContentConf {
                test_timeout: 30,
                tests,
                ..ContentConf::default()
            },
            secret: SecretConf {
                username: "admin".to_string(),
                user_password: "secret".to_string(),
                integrations: Vec::new(),
            },
            filter: TestFilter::default(),
            server_numeric_version: "5.5.0".to_string(),
        }
    }

    pub fn ctx(&self) -> RunContext<'_> {
        RunContext {
            settings: &self.settings,
            conf: &self.conf,
            secret: &self.secret,
            filter: &self.filter,
            server_url: SERVER_URL,
            server_numeric_version: &self.server_numeric_version,
            thread_index: 0,
        }
    }

    pub fn connection(&self) -> ServerConnection {
        ServerConnection {
            url: SERVER_URL.to_string(),
            username: self.secret.username.clone(),
            password: self.secret.user_password.clone(),
        }
    }
}

/// Runner with a zero cooldown, recording its events
pub fn runner_with_events(
    client: Arc<ScriptedClient>,
    notifier: Option<Arc<RecordingNotifier>>,
) -> (TestRunner<ScriptedClient>, Arc<Mutex<Vec<RunEvent>>>) {
    let notifier = notifier.map(|n| n as Arc<dyn FailureNotifier>);
    let mut runner = TestRunner::new(client, notifier).with_cooldown(Duration::ZERO);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    runner.add_event_handler(move |event| sink.lock().unwrap().push(event));
    (runner, events)
}

/// Result of one worker run
pub struct WorkerResult {
    pub outcome: Result<DrainStats, ClientError>,
    pub keeper: TestsDataKeeper,
    pub events: Vec<RunEvent>,
}

/// Run a whole worker over `fixture`
pub async fn run_worker(
    fixture: &Fixture,
    client: Arc<ScriptedClient>,
    notifier: Option<Arc<RecordingNotifier>>,
) -> WorkerResult {
    let (runner, events) = runner_with_events(client, notifier);
    let mut keeper = TestsDataKeeper::new();
    let outcome = runner.execute_testing(&fixture.ctx(), &mut keeper).await;
    let events = events.lock().unwrap().clone();
    WorkerResult {
        outcome,
        keeper,
        events,
    }
}

/// Assert every id ended in exactly one outcome class
pub fn assert_classified_once(keeper: &TestsDataKeeper, playbook_ids: &[&str]) {
    let results = &keeper.results;
    for id in playbook_ids {
        let succeeded = results.succeeded.iter().filter(|s| s.as_str() == *id).count();
        let failed = results
            .failed
            .iter()
            .filter(|f| f.as_str() == *id || f.strip_suffix(" (Mock Disabled)") == Some(*id))
            .count();
        let skipped = results.skipped.iter().filter(|s| s.playbook_id == *id).count();
        assert_eq!(
            succeeded + failed + skipped,
            1,
            "{} classified {} times (succeeded {}, failed {}, skipped {})",
            id,
            succeeded + failed + skipped,
            succeeded,
            failed,
            skipped
        );
    }
}

/// Number of events matching `predicate`
pub fn count_events(events: &[RunEvent], predicate: impl Fn(&RunEvent) -> bool) -> usize {
    events.iter().filter(|e| predicate(e)).count()
}
