//! Server client configuration

use crate::core::config::RunnerConfig;

/// Configuration for the external check client
#[derive(Debug, Clone)]
pub struct ServerClientConfig {
    /// Path to the check executable
    ///
    /// If not provided, defaults to "content-test-check" (assumes it's on PATH).
    pub command: Option<String>,

    /// Arguments placed before the action name
    pub args: Vec<String>,

    /// Upper bound on a single invocation in seconds
    pub timeout_secs: u64,
}

impl Default for ServerClientConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: 3600,
        }
    }
}

impl ServerClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: String) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

impl From<&RunnerConfig> for ServerClientConfig {
    fn from(config: &RunnerConfig) -> Self {
        Self::new()
            .with_command(config.check_command.clone())
            .with_args(config.check_args.clone())
            .with_timeout(config.check_timeout_secs)
    }
}
