//! Test executor - runs one playbook through the server client

use crate::{
    core::{descriptor::TestOptions, params::BoundIntegration, settings::ExecutionSettings},
    notify::{FailedTestNotice, FailureNotifier},
    server::{CheckOutcome, CheckRequest, ClientError, PlaybookStatus, ServerClient, ServerConnection},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of running one playbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Completed, or skipped by the server as not supported
    Passed { status: PlaybookStatus },
    /// Any other status, or a per-test client failure
    Failed {
        status: Option<PlaybookStatus>,
        incident_id: Option<String>,
        error: Option<String>,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Passed { .. })
    }
}

/// A playbook ready to run: integrations already bound
#[derive(Debug, Clone)]
pub struct PreparedTest {
    pub playbook_id: String,
    pub message: String,
    pub integrations: Vec<BoundIntegration>,
    pub options: TestOptions,
}

/// Runs prepared tests and classifies their status
pub struct TestExecutor<C> {
    client: Arc<C>,
    notifier: Option<Arc<dyn FailureNotifier>>,
}

impl<C: ServerClient> TestExecutor<C> {
    pub fn new(client: Arc<C>, notifier: Option<Arc<dyn FailureNotifier>>) -> Self {
        Self { client, notifier }
    }

    /// Run `test` against `server`
    ///
    /// API, transport and timeout errors fail the test. Internal errors
    /// mean the tooling itself is broken and are returned to the caller.
    pub async fn execute(
        &self,
        settings: &ExecutionSettings,
        server: &ServerConnection,
        test: &PreparedTest,
    ) -> Result<ExecutionResult, ClientError> {
        info!("Executing test: {}", test.message);

        let request = CheckRequest {
            server: server.clone(),
            playbook_id: test.playbook_id.clone(),
            integrations: test.integrations.clone(),
            options: test.options,
        };

        let result = match self.client.check_integration(&request).await {
            Ok(CheckOutcome { status, .. }) if status.is_success() => {
                info!("Test {} passed with status {:?}", test.playbook_id, status);
                return Ok(ExecutionResult::Passed { status });
            }
            Ok(CheckOutcome { status, incident_id }) => {
                warn!("Test {} ended with status {:?}", test.playbook_id, status);
                ExecutionResult::Failed {
                    status: Some(status),
                    incident_id,
                    error: None,
                }
            }
            Err(e) if e.is_test_failure() => {
                error!("Check failed for {}: {}", test.playbook_id, e);
                ExecutionResult::Failed {
                    status: None,
                    incident_id: None,
                    error: Some(e.to_string()),
                }
            }
            Err(e) => return Err(e),
        };

        if !settings.is_local_run() {
            if let ExecutionResult::Failed { incident_id, .. } = &result {
                self.notify(settings, server, test, incident_id.clone()).await;
            }
        }

        Ok(result)
    }

    async fn notify(
        &self,
        settings: &ExecutionSettings,
        server: &ServerConnection,
        test: &PreparedTest,
        incident_id: Option<String>,
    ) {
        let Some(notifier) = &self.notifier else {
            debug!("No notifier configured, not reporting {}", test.playbook_id);
            return;
        };

        let notice = FailedTestNotice {
            playbook_id: test.playbook_id.clone(),
            build_number: settings.build_number.clone(),
            incident_id,
            server_url: server.url.clone(),
            build_name: settings.build_name.clone(),
        };

        if let Err(e) = notifier.notify_failed_test(&notice).await {
            warn!("Failed to send notification for {}: {}", test.playbook_id, e);
        }
    }
}
