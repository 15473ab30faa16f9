//! Check results and client error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a client failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The server answered with an error
    Api,
    /// The server could not be reached
    Transport,
    /// The call did not finish in time
    Timeout,
    /// The check tooling itself is broken (missing, bad output)
    Internal,
}

/// Error returned by a server client
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?} error: {message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    pub fn timeout(secs: u64) -> Self {
        Self::new(ErrorKind::Timeout, format!("Timeout after {} seconds", secs))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether the failure belongs to one test rather than the whole run
    pub fn is_test_failure(&self) -> bool {
        !matches!(self.kind, ErrorKind::Internal)
    }
}

/// Final status of a playbook run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybookStatus {
    Completed,
    Failed,
    #[serde(alias = "inprogress")]
    InProgress,
    FailedDockerTest,
    NotSupportedVersion,
    Error,
    /// Any status this runner does not know
    #[serde(other)]
    Unknown,
}

impl PlaybookStatus {
    /// Completed and not-supported-version both count as passing
    pub fn is_success(self) -> bool {
        matches!(self, PlaybookStatus::Completed | PlaybookStatus::NotSupportedVersion)
    }
}

/// Outcome of one integration check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub status: PlaybookStatus,

    /// Incident created for the playbook run, if any
    #[serde(default)]
    pub incident_id: Option<String>,
}

impl CheckOutcome {
    pub fn new(status: PlaybookStatus) -> Self {
        Self {
            status,
            incident_id: None,
        }
    }

    pub fn with_incident(mut self, incident_id: impl Into<String>) -> Self {
        self.incident_id = Some(incident_id.into());
        self
    }
}
