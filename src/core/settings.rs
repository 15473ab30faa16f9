//! Process-wide execution settings

use std::path::PathBuf;

/// Server version name used when the run is not an AMI build
pub const NON_AMI_SERVER_VERSION: &str = "NonAMI";

/// Everything a run needs to know about its environment
///
/// Built once from the command line and passed by reference afterwards.
#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub api_key: String,

    /// Explicit server URL; set for local runs only
    pub server: Option<String>,

    pub conf_path: PathBuf,
    pub secret_conf_path: Option<PathBuf>,
    pub nightly: bool,

    /// Chat token used for failure notifications
    pub slack_token: String,

    /// CI token; carried for notification context
    pub circleci_token: String,

    pub build_number: String,
    pub build_name: String,
    pub service_account: Option<PathBuf>,
    pub is_ami: bool,
    pub mem_check: bool,

    /// Instance name (AMI role) the tests should run against
    pub server_version: String,

    /// Explicit list of playbook ids to run
    pub tests_list: Option<Vec<String>>,
}

impl ExecutionSettings {
    /// A local run targets an explicit server URL instead of CI instances
    pub fn is_local_run(&self) -> bool {
        self.server.is_some()
    }

    /// Parse a comma separated test list, dropping blanks
    pub fn parse_tests_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> ExecutionSettings {
    ExecutionSettings {
        api_key: "api-key".to_string(),
        server: None,
        conf_path: PathBuf::from("conf.json"),
        secret_conf_path: None,
        nightly: false,
        slack_token: "slack".to_string(),
        circleci_token: "circle".to_string(),
        build_number: "1234".to_string(),
        build_name: "Private".to_string(),
        service_account: None,
        is_ami: true,
        mem_check: false,
        server_version: "Demisto Marketplace".to_string(),
        tests_list: None,
    }
}
