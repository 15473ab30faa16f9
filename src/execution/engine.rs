//! Test runner - drains the test queue of one server instance

use crate::{
    core::{
        config::{ContentConf, SecretConf, TestFilter},
        descriptor::TestDescriptor,
        params::{bind_integration_params, update_test_msg, Placeholders},
        results::{ResultAccumulator, SkipReason, TestsDataKeeper},
        settings::ExecutionSettings,
    },
    execution::{
        executor::{ExecutionResult, PreparedTest, TestExecutor},
        round::RoundTracker,
        scheduler::{Decision, SkipFilter},
    },
    notify::FailureNotifier,
    server::{ClientError, PlaybookStatus, ServerClient, ServerConnection},
};
use chrono::{DateTime, Local};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default pause after a round that made no progress
pub const DEFAULT_ROUND_COOLDOWN: Duration = Duration::from_secs(30);

/// Events that can occur while a worker runs its tests
#[derive(Debug, Clone)]
pub enum RunEvent {
    WorkerStarted {
        thread_index: usize,
        server_url: String,
        queued: usize,
    },
    NoTestsConfigured {
        thread_index: usize,
    },
    TestStarted {
        message: String,
        at: DateTime<Local>,
    },
    TestPassed {
        message: String,
        status: PlaybookStatus,
    },
    TestFailed {
        message: String,
        error: Option<String>,
    },
    TestFinished {
        message: String,
        at: DateTime<Local>,
    },
    TestSkipped {
        playbook_id: String,
        message: String,
        reason: SkipReason,
    },
    ParamsBindingFailed {
        playbook_id: String,
        error: String,
    },
    RoundCompleted {
        cooldown_secs: u64,
    },
    ThreadFailed {
        thread_index: usize,
        error: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Everything one worker needs to run its tests
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    pub settings: &'a ExecutionSettings,
    pub conf: &'a ContentConf,
    pub secret: &'a SecretConf,
    pub filter: &'a TestFilter,
    pub server_url: &'a str,
    pub server_numeric_version: &'a str,
    pub thread_index: usize,
}

impl RunContext<'_> {
    fn connection(&self) -> ServerConnection {
        ServerConnection {
            url: self.server_url.to_string(),
            username: self.secret.username.clone(),
            password: self.secret.user_password.clone(),
        }
    }
}

/// Counters for one drained queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub processed: usize,
    pub cooldowns: usize,
}

/// Queue of conf test records for the requested tests, in conf order
///
/// With no explicit test list every test in the conf is queued.
pub fn build_queue(settings: &ExecutionSettings, conf: &ContentConf) -> VecDeque<TestDescriptor> {
    let names: HashSet<String> = match &settings.tests_list {
        Some(tests) => tests.iter().cloned().collect(),
        None => conf.playbook_ids().into_iter().collect(),
    };
    conf.records_for(&names).into()
}

/// Runs a queue of tests against one server instance
pub struct TestRunner<C> {
    client: Arc<C>,
    executor: TestExecutor<C>,
    cooldown: Duration,
    event_handlers: Vec<EventHandler>,
}

impl<C: ServerClient> TestRunner<C> {
    pub fn new(client: Arc<C>, notifier: Option<Arc<dyn FailureNotifier>>) -> Self {
        let executor = TestExecutor::new(client.clone(), notifier);
        Self {
            client,
            executor,
            cooldown: DEFAULT_ROUND_COOLDOWN,
            event_handlers: Vec::new(),
        }
    }

    /// Pause used after a round without progress
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(RunEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    fn emit_event(&self, event: RunEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Run every queued test of `ctx` and fold the results into `keeper`
    ///
    /// Results collected before a fatal error are still added to `keeper`,
    /// together with a failure marker for this worker.
    pub async fn execute_testing(
        &self,
        ctx: &RunContext<'_>,
        keeper: &mut TestsDataKeeper,
    ) -> Result<DrainStats, ClientError> {
        let mut results = ResultAccumulator::new();
        results.unmockable_integrations = ctx.conf.unmockable_integrations.clone();

        if ctx.conf.tests.is_empty() {
            info!("No tests configured for worker {}", ctx.thread_index);
            self.emit_event(RunEvent::NoTestsConfigured {
                thread_index: ctx.thread_index,
            });
            keeper.add_tests_data(results);
            return Ok(DrainStats::default());
        }

        let outcome = self.run_worker(ctx, &mut results).await;

        if let Err(e) = &outcome {
            error!("Worker {} failed: {}", ctx.thread_index + 1, e);
            results.record_thread_failure(ctx.thread_index);
            self.emit_event(RunEvent::ThreadFailed {
                thread_index: ctx.thread_index,
                error: e.to_string(),
            });
        }

        keeper.add_tests_data(results);
        outcome
    }

    async fn run_worker(
        &self,
        ctx: &RunContext<'_>,
        results: &mut ResultAccumulator,
    ) -> Result<DrainStats, ClientError> {
        let connection = ctx.connection();

        self.client.turn_off_telemetry(&connection).await?;
        self.client.disable_all_integrations(&connection).await?;

        let queue = build_queue(ctx.settings, ctx.conf);
        self.emit_event(RunEvent::WorkerStarted {
            thread_index: ctx.thread_index,
            server_url: ctx.server_url.to_string(),
            queued: queue.len(),
        });

        self.drain_queue(ctx, &connection, queue, results).await
    }

    /// Run tests until the queue is empty
    ///
    /// Seeing a test again starts a new round after the cooldown. Nothing
    /// here puts a test back on the queue.
    pub async fn drain_queue(
        &self,
        ctx: &RunContext<'_>,
        connection: &ServerConnection,
        mut queue: VecDeque<TestDescriptor>,
        results: &mut ResultAccumulator,
    ) -> Result<DrainStats, ClientError> {
        let skip_filter = SkipFilter::from_conf(ctx.conf, ctx.filter, ctx.server_numeric_version);
        let placeholders = Placeholders::for_server(ctx.server_url);
        let mut tracker = RoundTracker::new();
        let mut stats = DrainStats::default();

        while let Some(descriptor) = queue.pop_front() {
            if tracker.observe(&descriptor) {
                info!(
                    "Round {} completed, cooling down for {:?}",
                    tracker.completed_rounds(),
                    self.cooldown
                );
                self.emit_event(RunEvent::RoundCompleted {
                    cooldown_secs: self.cooldown.as_secs(),
                });
                stats.cooldowns += 1;
                tokio::time::sleep(self.cooldown).await;
            }

            self.run_test_scenario(ctx, connection, &skip_filter, &placeholders, &descriptor, results)
                .await?;
            stats.processed += 1;
        }

        debug!(
            "Drained queue: {} processed, {} cooldowns",
            stats.processed, stats.cooldowns
        );
        Ok(stats)
    }

    /// Classify one test: skip it, fail it at setup, or run it
    async fn run_test_scenario(
        &self,
        ctx: &RunContext<'_>,
        connection: &ServerConnection,
        skip_filter: &SkipFilter,
        placeholders: &Placeholders,
        descriptor: &TestDescriptor,
        results: &mut ResultAccumulator,
    ) -> Result<(), ClientError> {
        let playbook_id = descriptor.playbook_id.as_str();

        for (name, reason) in skip_filter.skipped_integrations_of(descriptor) {
            results.record_skipped_integration(name, reason);
        }

        if let Decision::Skip(reason) = skip_filter.decide(descriptor) {
            debug!("Skipping {}: {}", playbook_id, reason);
            self.emit_event(RunEvent::TestSkipped {
                playbook_id: playbook_id.to_string(),
                message: descriptor.message(),
                reason: reason.clone(),
            });
            results.record_skip(playbook_id, reason);
            return Ok(());
        }

        let integrations = match bind_integration_params(
            &ctx.settings.api_key,
            &descriptor.integrations,
            &ctx.secret.integrations,
            &descriptor.instance_names,
            playbook_id,
            placeholders,
        ) {
            Ok(integrations) => integrations,
            Err(e) => {
                warn!("Failed to bind params for {}: {}", playbook_id, e);
                self.emit_event(RunEvent::ParamsBindingFailed {
                    playbook_id: playbook_id.to_string(),
                    error: e.to_string(),
                });
                results.record_setup_failure(playbook_id);
                return Ok(());
            }
        };

        let message = update_test_msg(&integrations, &descriptor.message());
        let test = PreparedTest {
            playbook_id: playbook_id.to_string(),
            message: message.clone(),
            integrations,
            options: descriptor.options(ctx.conf.test_timeout),
        };

        self.emit_event(RunEvent::TestStarted {
            message: message.clone(),
            at: Local::now(),
        });
        let outcome = self.executor.execute(ctx.settings, connection, &test).await;
        self.emit_event(RunEvent::TestFinished {
            message: message.clone(),
            at: Local::now(),
        });

        match outcome? {
            ExecutionResult::Passed { status } => {
                results.record_success(playbook_id);
                self.emit_event(RunEvent::TestPassed { message, status });
            }
            ExecutionResult::Failed { error, .. } => {
                results.record_failure(playbook_id);
                self.emit_event(RunEvent::TestFailed { message, error });
            }
        }
        Ok(())
    }
}
