//! CLI command definitions

use crate::core::settings::{ExecutionSettings, NON_AMI_SERVER_VERSION};
use clap::{ArgAction, Args};
use std::path::PathBuf;

/// Run the playbook tests of a build
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// The API key for the server
    #[arg(short = 'k', long, alias = "apiKey")]
    pub api_key: String,

    /// The server URL to connect to (local run)
    #[arg(short, long)]
    pub server: Option<String>,

    /// Path to conf file
    #[arg(short, long)]
    pub conf: PathBuf,

    /// Path to secret conf file
    #[arg(short = 'e', long)]
    pub secret: Option<PathBuf>,

    /// Run nightly tests
    #[arg(short, long, value_parser = str2bool, action = ArgAction::Set, default_value_t = false)]
    pub nightly: bool,

    /// The token for slack
    #[arg(short = 't', long)]
    pub slack: String,

    /// The token for circleci
    #[arg(short = 'a', long)]
    pub circleci: String,

    /// The build number
    #[arg(short = 'b', long, alias = "buildNumber")]
    pub build_number: String,

    /// The build name
    #[arg(short = 'g', long, alias = "buildName")]
    pub build_name: String,

    /// Path to GCS service account
    #[arg(long, alias = "service_account")]
    pub service_account: Option<PathBuf>,

    /// Is AMI build or not
    #[arg(short = 'i', long, alias = "isAMI", value_parser = str2bool, action = ArgAction::Set, default_value_t = false)]
    pub is_ami: bool,

    /// Should trigger memory checks or not
    #[arg(short = 'm', long, alias = "memCheck", value_parser = str2bool, action = ArgAction::Set, default_value_t = false)]
    pub mem_check: bool,

    /// Which server version to run the tests on (valid only when using AMI)
    #[arg(short = 'd', long, alias = "serverVersion", default_value = NON_AMI_SERVER_VERSION)]
    pub server_version: String,

    /// Comma separated list of specific tests to run
    #[arg(short = 'l', long, alias = "testsList")]
    pub tests_list: Option<String>,

    /// Runner configuration YAML file
    #[arg(long)]
    pub runner_config: Option<PathBuf>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl RunCommand {
    pub fn to_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            api_key: self.api_key.clone(),
            server: self.server.clone(),
            conf_path: self.conf.clone(),
            secret_conf_path: self.secret.clone(),
            nightly: self.nightly,
            slack_token: self.slack.clone(),
            circleci_token: self.circleci.clone(),
            build_number: self.build_number.clone(),
            build_name: self.build_name.clone(),
            service_account: self.service_account.clone(),
            is_ami: self.is_ami,
            mem_check: self.mem_check,
            server_version: self.server_version.clone(),
            tests_list: self
                .tests_list
                .as_deref()
                .map(ExecutionSettings::parse_tests_list),
        }
    }
}

/// Check the base branch of an external pull request
#[derive(Debug, Args, Clone)]
pub struct CheckBaseBranchCommand {
    /// Branch of the form pull/<number>
    pub pull_request: String,

    /// Verify the API's TLS certificate
    #[arg(long)]
    pub verify_tls: bool,

    /// Pull request API base URL
    #[arg(long)]
    pub api_base: Option<String>,

    /// Branch external pull requests must not target
    #[arg(long)]
    pub mainline: Option<String>,

    /// Runner configuration YAML file
    #[arg(long)]
    pub runner_config: Option<PathBuf>,
}

/// Validate a conf file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to conf file
    #[arg(short, long)]
    pub conf: PathBuf,

    /// Path to secret conf file
    #[arg(short = 'e', long)]
    pub secret: Option<PathBuf>,

    /// Server numeric version to check version ranges against
    #[arg(long, default_value = crate::core::instances::DEFAULT_SERVER_VERSION)]
    pub server_numeric_version: String,

    /// Comma separated list of specific tests
    #[arg(short = 'l', long)]
    pub tests_list: Option<String>,

    /// Runner configuration YAML file
    #[arg(long)]
    pub runner_config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Build name to filter by
    #[arg(short, long)]
    pub build: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show a single run by ID
    #[arg(long)]
    pub run_id: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse the boolean spellings CI scripts pass
pub fn str2bool(s: &str) -> Result<bool, String> {
    match s.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(format!("Boolean value expected, got '{}'", s)),
    }
}
