//! Test descriptors as they appear in the conf file's `tests` list

use crate::core::version::{LooseVersion, DEFAULT_FROM_VERSION, DEFAULT_TO_VERSION};
use serde::{Deserialize, Deserializer, Serialize};

/// Default container memory threshold (MB) when a test sets none
pub const DEFAULT_MEMORY_THRESHOLD: u64 = 75;

/// Default container pid threshold when a test sets none
pub const DEFAULT_PID_THRESHOLD: u64 = 3;

/// A single playbook test
///
/// Equality and hashing cover every field, so two descriptors are the same
/// test exactly when their conf entries agree. The round tracker relies on
/// this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestDescriptor {
    #[serde(rename = "playbookID")]
    pub playbook_id: String,

    /// Integrations the playbook needs; conf allows a single string
    #[serde(default, deserialize_with = "one_or_many")]
    pub integrations: Vec<String>,

    /// Instance names to pick when the secret conf has several instances
    #[serde(default, deserialize_with = "one_or_many")]
    pub instance_names: Vec<String>,

    #[serde(default, rename = "fromversion")]
    pub from_version: Option<String>,

    #[serde(default, rename = "toversion")]
    pub to_version: Option<String>,

    /// Timeout in seconds (falls back to the conf-wide `testTimeout`)
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub memory_threshold: Option<u64>,

    #[serde(default)]
    pub pid_threshold: Option<u64>,
}

/// Resource limits and timeout passed to the check routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOptions {
    pub timeout: u64,
    pub memory_threshold: u64,
    pub pid_threshold: u64,
}

impl TestDescriptor {
    /// Descriptor with only a playbook id
    pub fn new(playbook_id: impl Into<String>) -> Self {
        Self {
            playbook_id: playbook_id.into(),
            integrations: Vec::new(),
            instance_names: Vec::new(),
            from_version: None,
            to_version: None,
            timeout: None,
            memory_threshold: None,
            pid_threshold: None,
        }
    }

    pub fn with_integrations<I, S>(mut self, integrations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.integrations = integrations.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_versions(mut self, from: &str, to: &str) -> Self {
        self.from_version = Some(from.to_string());
        self.to_version = Some(to.to_string());
        self
    }

    pub fn from_version_or_default(&self) -> &str {
        self.from_version.as_deref().unwrap_or(DEFAULT_FROM_VERSION)
    }

    pub fn to_version_or_default(&self) -> &str {
        self.to_version.as_deref().unwrap_or(DEFAULT_TO_VERSION)
    }

    /// Whether `server_version` falls inside `[fromversion, toversion]`
    pub fn supports_version(&self, server_version: &LooseVersion) -> bool {
        let from = LooseVersion::parse(self.from_version_or_default());
        let to = LooseVersion::parse(self.to_version_or_default());
        server_version.within(&from, &to)
    }

    pub fn options(&self, default_timeout: u64) -> TestOptions {
        TestOptions {
            timeout: self.timeout.unwrap_or(default_timeout),
            memory_threshold: self.memory_threshold.unwrap_or(DEFAULT_MEMORY_THRESHOLD),
            pid_threshold: self.pid_threshold.unwrap_or(DEFAULT_PID_THRESHOLD),
        }
    }

    /// Base progress message, e.g. `playbook: Test-Foo`
    pub fn message(&self) -> String {
        format!("playbook: {}", self.playbook_id)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}
