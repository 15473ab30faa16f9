//! Check tool subprocess client
//!
//! Calls `<command> <action>` with a JSON request on stdin and reads a JSON
//! response from stdout.

use crate::server::{
    CheckOutcome, CheckRequest, ClientError, ServerClient, ServerClientConfig, ServerConnection,
};
use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Exit code the check tool uses when the server is unreachable
const TRANSPORT_ERROR_EXIT_CODE: i32 = 3;

#[derive(Serialize)]
struct ServerOnly<'a> {
    server: &'a ServerConnection,
}

/// Client that shells out to the check tool
#[derive(Debug, Clone)]
pub struct SubprocessServerClient {
    command: String,
    args: Vec<String>,
    timeout_secs: u64,
}

impl SubprocessServerClient {
    pub fn new(config: ServerClientConfig) -> Self {
        Self {
            command: config
                .command
                .unwrap_or_else(|| "content-test-check".to_string()),
            args: config.args,
            timeout_secs: config.timeout_secs,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run one action and return its stdout
    ///
    /// # Errors
    /// - `Internal` if the tool cannot be spawned or prints non UTF-8
    /// - `Timeout` if it does not exit within the configured timeout
    /// - `Transport` for exit code 3, `Api` for any other failure
    async fn invoke<T: Serialize>(&self, action: &str, payload: &T) -> Result<String, ClientError> {
        let input = serde_json::to_vec(payload)
            .map_err(|e| ClientError::internal(format!("Failed to encode request: {}", e)))?;

        debug!("Running {} {} ({} bytes of input)", self.command, action, input.len());

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(action)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ClientError::internal(format!("Failed to execute {}: {}", self.command, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await.map_err(|e| {
                ClientError::internal(format!("Failed to write request to {}: {}", self.command, e))
            })?;
        }

        let output = timeout(Duration::from_secs(self.timeout_secs), child.wait_with_output())
            .await
            .map_err(|_| ClientError::timeout(self.timeout_secs))?
            .map_err(|e| ClientError::internal(format!("Failed to wait for {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("{} {} exited with code {}: {}", self.command, action, exit_code, stderr.trim());
            let message = format!("{} exited with code {}: {}", action, exit_code, stderr.trim());
            return Err(match exit_code {
                TRANSPORT_ERROR_EXIT_CODE => ClientError::transport(message),
                _ => ClientError::api(message),
            });
        }

        String::from_utf8(output.stdout)
            .map_err(|e| ClientError::internal(format!("Failed to decode {} output: {}", self.command, e)))
    }
}

#[async_trait]
impl ServerClient for SubprocessServerClient {
    async fn turn_off_telemetry(&self, server: &ServerConnection) -> Result<(), ClientError> {
        self.invoke("turn-off-telemetry", &ServerOnly { server }).await?;
        Ok(())
    }

    async fn disable_all_integrations(&self, server: &ServerConnection) -> Result<(), ClientError> {
        self.invoke("disable-integrations", &ServerOnly { server }).await?;
        Ok(())
    }

    async fn check_integration(&self, request: &CheckRequest) -> Result<CheckOutcome, ClientError> {
        let stdout = self.invoke("check", request).await?;
        serde_json::from_str(stdout.trim()).map_err(|e| {
            ClientError::internal(format!(
                "Unexpected check output for {}: {} ({})",
                request.playbook_id,
                stdout.trim(),
                e
            ))
        })
    }
}
