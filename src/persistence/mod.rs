//! Persistence layer: result files and run history

pub mod result_files;
#[cfg(feature = "sqlite")]
pub mod store;

pub use result_files::write_result_files;
#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{results::TestsDataKeeper, settings::ExecutionSettings};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Passed => "Passed",
            RunStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Passed" => RunStatus::Passed,
            _ => RunStatus::Failed,
        }
    }
}

/// Summary of one test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub build_name: String,
    pub build_number: String,
    pub server_version: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Trait for run history backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// Runs of one build, newest first
    async fn list_runs(&self, build_name: &str) -> Result<Vec<RunSummary>>;

    /// Every build name with at least one run
    async fn list_builds(&self) -> Result<Vec<String>>;
}

/// In-memory history (for tests or `--no-history`)
#[derive(Default)]
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<Vec<RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.retain(|r| r.run_id != run.run_id);
        runs.push(run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.iter().find(|r| r.run_id == run_id).cloned())
    }

    async fn list_runs(&self, build_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .iter()
            .filter(|r| r.build_name == build_name)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_builds(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut builds: Vec<String> = runs.iter().map(|r| r.build_name.clone()).collect();
        builds.sort();
        builds.dedup();
        Ok(builds)
    }
}

/// Create a summary of a finished run
pub fn create_summary(
    settings: &ExecutionSettings,
    keeper: &TestsDataKeeper,
    started_at: DateTime<Utc>,
) -> RunSummary {
    let results = &keeper.results;
    RunSummary {
        run_id: Uuid::new_v4(),
        build_name: settings.build_name.clone(),
        build_number: settings.build_number.clone(),
        server_version: settings.server_version.clone(),
        status: if keeper.has_failures() {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        },
        started_at,
        completed_at: Utc::now(),
        succeeded: results.succeeded.len(),
        failed: results.failed.len(),
        skipped: results.skipped.len(),
    }
}

/// History is best effort: a store that fails to open is replaced by an
/// in-memory one
pub fn store_or_in_memory(opened: Result<Arc<dyn PersistenceBackend>>) -> Arc<dyn PersistenceBackend> {
    match opened {
        Ok(store) => store,
        Err(e) => {
            warn!("Run history unavailable, keeping this run in memory: {:#}", e);
            Arc::new(InMemoryPersistence::new())
        }
    }
}

/// Save `run`, logging instead of failing; returns whether it was saved
pub async fn save_run_or_warn(store: &dyn PersistenceBackend, run: &RunSummary) -> bool {
    match store.save_run(run).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to save run {} to history: {:#}", run.run_id, e);
            false
        }
    }
}
