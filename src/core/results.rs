//! Test outcome bookkeeping

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Suffix appended to failed playbook ids; private builds never mock
pub const MOCK_DISABLED_SUFFIX: &str = " (Mock Disabled)";

/// Why a test did not run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Not in the filter file's allow-list
    Filtered,
    /// Listed in the conf's `skipped_tests`, with the conf's reason
    BadTest(String),
    /// Needs integrations that are skipped by configuration
    Integration(Vec<String>),
    /// Server version outside the test's range
    VersionMismatch { from: String, to: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Filtered => write!(f, "not in filter"),
            SkipReason::BadTest(reason) => write!(f, "{}", reason),
            SkipReason::Integration(names) => write!(f, "skipped integration(s): {}", names.join(",")),
            SkipReason::VersionMismatch { from, to } => {
                write!(f, "version mismatch (test versions: {}-{})", from, to)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTest {
    pub playbook_id: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - reason: {}", self.playbook_id, self.reason)
    }
}

/// Results collected by one worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultAccumulator {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<SkippedTest>,

    /// `<integration> - reason: <reason>` entries
    pub skipped_integrations: BTreeSet<String>,

    /// Integration name -> reason
    pub unmockable_integrations: BTreeMap<String, String>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, playbook_id: &str) {
        self.succeeded.push(playbook_id.to_string());
    }

    /// Record a playbook that ran and failed
    pub fn record_failure(&mut self, playbook_id: &str) {
        self.failed.push(format!("{}{}", playbook_id, MOCK_DISABLED_SUFFIX));
    }

    /// Record a failure that happened before the playbook ran
    pub fn record_setup_failure(&mut self, playbook_id: &str) {
        self.failed.push(playbook_id.to_string());
    }

    /// Record a worker-level failure marker
    pub fn record_thread_failure(&mut self, thread_index: usize) {
        self.failed.push(thread_failure_marker(thread_index));
    }

    pub fn record_skip(&mut self, playbook_id: &str, reason: SkipReason) {
        self.skipped.push(SkippedTest {
            playbook_id: playbook_id.to_string(),
            reason,
        });
    }

    pub fn record_skipped_integration(&mut self, name: &str, reason: &str) {
        self.skipped_integrations
            .insert(format!("{} - reason: {}", name, reason));
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Number of playbooks that actually ran; worker failure markers are
    /// not playbooks
    pub fn tested_count(&self) -> usize {
        let failed = self
            .failed
            .iter()
            .filter(|entry| !is_thread_failure_marker(entry))
            .count();
        self.succeeded.len() + failed
    }
}

/// `~~ Thread <n> failed ~~`, numbered from one
pub fn thread_failure_marker(thread_index: usize) -> String {
    format!("~~ Thread {} failed ~~", thread_index + 1)
}

pub fn is_thread_failure_marker(entry: &str) -> bool {
    entry.starts_with("~~ Thread ") && entry.ends_with(" failed ~~")
}

/// Results of all workers in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestsDataKeeper {
    pub results: ResultAccumulator,
}

impl TestsDataKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one worker's results into the run
    pub fn add_tests_data(&mut self, worker: ResultAccumulator) {
        self.results.succeeded.extend(worker.succeeded);
        self.results.failed.extend(worker.failed);
        self.results.skipped.extend(worker.skipped);
        self.results
            .skipped_integrations
            .extend(worker.skipped_integrations);
        self.results
            .unmockable_integrations
            .extend(worker.unmockable_integrations);
    }

    pub fn has_failures(&self) -> bool {
        self.results.has_failures()
    }
}
