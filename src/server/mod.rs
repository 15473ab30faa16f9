//! Client for the server under test
//!
//! The runner never talks to the server's REST API directly. Everything
//! server-side goes through [`ServerClient`], implemented in production by
//! an external check tool run as a subprocess.

pub mod client;
pub mod response;
pub mod subprocess_client;

use crate::core::{descriptor::TestOptions, params::BoundIntegration};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::ServerClientConfig;
pub use response::{CheckOutcome, ClientError, ErrorKind, PlaybookStatus};
pub use subprocess_client::SubprocessServerClient;

/// Where and as whom to reach the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConnection {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// One integration check: run a playbook with its integrations configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub server: ServerConnection,
    pub playbook_id: String,
    pub integrations: Vec<BoundIntegration>,
    pub options: TestOptions,
}

/// Operations the runner needs from the server
#[async_trait]
pub trait ServerClient: Send + Sync {
    /// Turn off usage telemetry on the server
    async fn turn_off_telemetry(&self, server: &ServerConnection) -> Result<(), ClientError>;

    /// Disable every integration instance left over from earlier runs
    async fn disable_all_integrations(&self, server: &ServerConnection) -> Result<(), ClientError>;

    /// Configure the integrations, run the playbook and wait for its status
    async fn check_integration(&self, request: &CheckRequest) -> Result<CheckOutcome, ClientError>;
}
