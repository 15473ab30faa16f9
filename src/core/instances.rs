//! Server instances and the version installed on them

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Version assumed when it cannot be determined
pub const DEFAULT_SERVER_VERSION: &str = "99.99.98";

/// A server the tests can run against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInstance {
    /// Instance (AMI role) name
    pub name: String,
    /// IP or host name
    pub host: String,
}

impl ServerInstance {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }

    /// `https://<host>`, or the host itself when it already has a scheme
    pub fn server_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            self.host.clone()
        } else {
            format!("https://{}", self.host)
        }
    }
}

/// Parse `name:ip` lines
pub fn parse_instances(content: &str) -> Vec<ServerInstance> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match line.split_once(':') {
            Some((name, host)) => Some(ServerInstance::new(name.trim(), host.trim())),
            None => {
                warn!("Ignoring malformed instance line: {}", line);
                None
            }
        })
        .collect()
}

/// Read the instance file
pub fn load_instances<P: AsRef<Path>>(path: P) -> Result<Vec<ServerInstance>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read instances file {}", path.display()))?;
    Ok(parse_instances(&content))
}

#[derive(Debug, Deserialize)]
struct EnvResult {
    #[serde(rename = "Role", default)]
    role: String,
    #[serde(rename = "AmiName", default)]
    ami_name: Option<String>,
}

fn ami_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Demisto-(?:Circle-CI|MarketPlace)-Content-[\w-]+-([\d.]+)-[\d]{5}")
            .expect("static regex is valid")
    })
}

/// Extract the server version from an environment results document
///
/// Keeps AMI names whose role contains `server_version`; the version is
/// only trusted when exactly one distinct AMI name remains.
pub fn server_version_from_env_results(env_results: &str, server_version: &str) -> String {
    let results: Vec<EnvResult> = match serde_json::from_str(env_results) {
        Ok(results) => results,
        Err(e) => {
            warn!("Failed to parse environment results: {}", e);
            return DEFAULT_SERVER_VERSION.to_string();
        }
    };

    let ami_names: BTreeSet<String> = results
        .into_iter()
        .filter(|env| env.role.contains(server_version))
        .filter_map(|env| env.ami_name)
        .collect();

    if ami_names.len() != 1 {
        debug!("Found {} AMI names for {}, using default version", ami_names.len(), server_version);
        return DEFAULT_SERVER_VERSION.to_string();
    }

    ami_names
        .iter()
        .next()
        .and_then(|name| ami_version_pattern().captures(name))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_SERVER_VERSION.to_string())
}

/// Numeric version of the server the run targets
pub fn get_server_numeric_version(
    server_version: &str,
    is_local_run: bool,
    env_results_path: &Path,
) -> String {
    if is_local_run || !env_results_path.is_file() {
        return DEFAULT_SERVER_VERSION.to_string();
    }

    match std::fs::read_to_string(env_results_path) {
        Ok(content) => server_version_from_env_results(&content, server_version),
        Err(e) => {
            warn!("Failed to read {}: {}", env_results_path.display(), e);
            DEFAULT_SERVER_VERSION.to_string()
        }
    }
}
