//! Branch guard - external pull requests must not target the mainline branch

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BranchGuardError {
    #[error("Expected an argument of the form pull/<number>, got '{0}'")]
    InvalidPullRequest(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Outcome of a base branch check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchVerdict {
    /// The PR targets some other branch
    Allowed { base: String },
    /// The PR targets the mainline branch
    TargetsMainline,
    /// The base branch could not be read
    Undetermined(UndeterminedCause),
}

/// Why a base branch could not be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndeterminedCause {
    /// Network error or a non-200 answer
    FetchFailed,
    /// The PR document has no `base.ref`
    NoBaseBranch,
}

impl BranchVerdict {
    /// Only a PR known to target mainline fails the build
    pub fn exit_code(&self) -> i32 {
        match self {
            BranchVerdict::TargetsMainline => 1,
            BranchVerdict::Allowed { .. } | BranchVerdict::Undetermined(_) => 0,
        }
    }
}

/// Parse `pull/<number>` into the PR number
pub fn parse_pull_request_arg(arg: &str) -> Result<u64, BranchGuardError> {
    arg.trim()
        .strip_prefix("pull/")
        .and_then(|number| number.parse().ok())
        .ok_or_else(|| BranchGuardError::InvalidPullRequest(arg.to_string()))
}

/// `base.ref` of a PR document
///
/// The API sometimes answers with a one-element array instead of the object.
pub fn base_ref_from_json(body: &Value) -> Option<&str> {
    let pr = match body {
        Value::Array(items) if items.len() == 1 => &items[0],
        Value::Object(_) => body,
        _ => return None,
    };
    pr.get("base")?.get("ref")?.as_str()
}

/// Unauthenticated client for the pull request API
pub struct PullRequestClient {
    client: reqwest::Client,
    api_base: String,
}

impl PullRequestClient {
    pub fn new(api_base: impl Into<String>, verify_tls: bool) -> Result<Self, BranchGuardError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!verify_tls)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn pull_request_url(&self, pr_number: u64) -> String {
        format!("{}/{}", self.api_base, pr_number)
    }

    /// Fetch the base branch of `pr_number`
    ///
    /// Returns `Ok(None)` for a document without a base branch; a non-200
    /// answer is an error.
    pub async fn fetch_base_branch(&self, pr_number: u64) -> Result<Option<String>, BranchGuardError> {
        let url = self.pull_request_url(pr_number);
        debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(BranchGuardError::Status {
                url,
                status: response.status(),
            });
        }

        let body: Value = response.json().await?;
        Ok(base_ref_from_json(&body).map(str::to_string))
    }
}

/// Decide whether `pr_number` may be merged
///
/// Fails open: anything that prevents reading the base branch is
/// `Undetermined`, with the cause.
pub async fn check_base_branch(
    client: &PullRequestClient,
    pr_number: u64,
    mainline_branch: &str,
) -> BranchVerdict {
    match client.fetch_base_branch(pr_number).await {
        Ok(Some(base)) if base == mainline_branch => BranchVerdict::TargetsMainline,
        Ok(Some(base)) => BranchVerdict::Allowed { base },
        Ok(None) => {
            warn!("PR {} has no base branch", pr_number);
            BranchVerdict::Undetermined(UndeterminedCause::NoBaseBranch)
        }
        Err(e) => {
            warn!("Failed to fetch PR {}: {}", pr_number, e);
            BranchVerdict::Undetermined(UndeterminedCause::FetchFailed)
        }
    }
}
