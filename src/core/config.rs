//! Conf files and runner configuration
//!
//! Three sources feed a run:
//! - the content conf (`conf.json`): tests and skip lists
//! - the secret conf: server credentials and integration instance params
//! - the optional runner config (YAML): knobs for this tool itself

use crate::core::descriptor::TestDescriptor;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Filter-file line that disables filtering
pub const RUN_ALL_TESTS_FORMAT: &str = "Run all tests";

fn default_test_timeout() -> u64 {
    30
}

/// Content test configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentConf {
    /// Default timeout (seconds) for tests without their own
    #[serde(rename = "testTimeout", default = "default_test_timeout")]
    pub test_timeout: u64,

    #[serde(default)]
    pub tests: Vec<TestDescriptor>,

    /// Playbook id -> reason
    #[serde(default)]
    pub skipped_tests: BTreeMap<String, String>,

    /// Integration name -> reason
    #[serde(default)]
    pub skipped_integrations: BTreeMap<String, String>,

    #[serde(default)]
    pub nightly_integrations: Vec<String>,

    /// Integration name -> reason
    #[serde(default)]
    pub unmockable_integrations: BTreeMap<String, String>,
}

impl ContentConf {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read conf file {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse conf file {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// All playbook ids in conf order
    pub fn playbook_ids(&self) -> Vec<String> {
        self.tests.iter().map(|t| t.playbook_id.clone()).collect()
    }

    /// Test records whose playbook id is in `names`, in conf order
    pub fn records_for(&self, names: &HashSet<String>) -> Vec<TestDescriptor> {
        self.tests
            .iter()
            .filter(|t| names.contains(&t.playbook_id))
            .cloned()
            .collect()
    }
}

/// One integration instance entry from the secret conf
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretIntegration {
    pub name: String,

    #[serde(default)]
    pub instance_name: Option<String>,

    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub byoi: Option<bool>,

    #[serde(default)]
    pub validate_test: Option<bool>,
}

/// Secret configuration: server credentials and integration params
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretConf {
    #[serde(default)]
    pub username: String,

    #[serde(rename = "userPassword", default)]
    pub user_password: String,

    #[serde(default)]
    pub integrations: Vec<SecretIntegration>,
}

impl SecretConf {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read secret conf file {}", path.display()))?;
        Ok(serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse secret conf file {}", path.display()))?)
    }
}

/// Load the conf file and, when given, the secret conf file
pub fn load_conf_files(
    conf_path: &Path,
    secret_conf_path: Option<&Path>,
) -> Result<(ContentConf, SecretConf)> {
    let conf = ContentConf::from_file(conf_path)?;
    let secret = match secret_conf_path {
        Some(path) => SecretConf::from_file(path)?,
        None => SecretConf::default(),
    };
    Ok((conf, secret))
}

/// Allow-list of tests from the filter file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFilter {
    tests: HashSet<String>,
    run_all: bool,
}

impl TestFilter {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tests = HashSet::new();
        let mut run_all = false;
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            if line == RUN_ALL_TESTS_FORMAT {
                run_all = true;
            }
            tests.insert(line.to_string());
        }
        Self { tests, run_all }
    }

    /// Read the filter file; a missing file means no filter
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter file {}", path.display()))?;
        Ok(Self::new(content.lines()))
    }

    /// True when the filter restricts which tests run
    pub fn is_configured(&self) -> bool {
        !self.tests.is_empty() && !self.run_all
    }

    pub fn contains(&self, playbook_id: &str) -> bool {
        self.tests.contains(playbook_id)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Settings for the runner itself, loaded from an optional YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Executable that talks to the server (check, telemetry, disable)
    pub check_command: String,

    /// Arguments passed to the check command before the action name
    pub check_args: Vec<String>,

    /// Upper bound on one invocation of the check command
    pub check_timeout_secs: u64,

    /// Pause after a round completes without the queue draining
    pub round_cooldown_secs: u64,

    /// Pause between server instances
    pub instance_pause_secs: u64,

    pub results_dir: PathBuf,
    pub filter_file: PathBuf,
    pub instances_file: PathBuf,
    pub env_results_file: PathBuf,

    /// Chat channel for failure notifications
    pub slack_channel: String,

    pub mainline_branch: String,

    /// Pull request endpoint, the PR number is appended
    pub pull_request_api: String,

    /// TLS verification for outbound HTTP; off by policy
    pub verify_tls: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            check_command: "content-test-check".to_string(),
            check_args: Vec::new(),
            check_timeout_secs: 3600,
            round_cooldown_secs: 30,
            instance_pause_secs: 8,
            results_dir: PathBuf::from("./Tests"),
            filter_file: PathBuf::from("./Tests/filter_file.txt"),
            instances_file: PathBuf::from("./Tests/instance_ips.txt"),
            env_results_file: PathBuf::from("./env_results.json"),
            slack_channel: "dmst-content-team".to_string(),
            mainline_branch: "master".to_string(),
            pull_request_api: "https://api.github.com/repos/demisto/content/pulls".to_string(),
            verify_tls: false,
        }
    }
}

impl RunnerConfig {
    /// Load runner config from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read runner config {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: RunnerConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_command.trim().is_empty() {
            anyhow::bail!("check_command must not be empty");
        }
        if self.mainline_branch.trim().is_empty() {
            anyhow::bail!("mainline_branch must not be empty");
        }
        if self.check_timeout_secs == 0 {
            anyhow::bail!("check_timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
