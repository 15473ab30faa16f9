//! Chat notifications for failed playbooks

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const SLACK_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Display name used for notification messages
pub const NOTIFIER_USERNAME: &str = "Content CircleCI";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack rejected the message: {0}")]
    Rejected(String),
}

/// What went wrong, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTestNotice {
    pub playbook_id: String,
    pub build_number: String,
    pub incident_id: Option<String>,
    pub server_url: String,
    pub build_name: String,
}

impl FailedTestNotice {
    /// Message text; links to the incident work plan when one exists
    pub fn text(&self) -> String {
        match &self.incident_id {
            Some(incident_id) => format!(
                "{} - {} Failed\n{}/#/WorkPlan/{}",
                self.build_name, self.playbook_id, self.server_url, incident_id
            ),
            None => format!(
                "{} - {} Failed\n{}",
                self.build_name, self.playbook_id, self.server_url
            ),
        }
    }
}

/// Sink for failed-test notifications
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    async fn notify_failed_test(&self, notice: &FailedTestNotice) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    username: &'a str,
    text: String,
}

/// Posts notifications to a Slack channel
pub struct SlackNotifier {
    client: reqwest::Client,
    token: String,
    channel: String,
    endpoint: String,
}

impl SlackNotifier {
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            channel: channel.into(),
            endpoint: SLACK_POST_MESSAGE_URL.to_string(),
        })
    }

    /// Send to another endpoint (a Slack-compatible proxy)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl FailureNotifier for SlackNotifier {
    async fn notify_failed_test(&self, notice: &FailedTestNotice) -> Result<(), NotifyError> {
        debug!("Notifying {} about {}", self.channel, notice.playbook_id);

        let body: Value = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&PostMessage {
                channel: &self.channel,
                username: NOTIFIER_USERNAME,
                text: notice.text(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Slack reports failures in the body with a 200
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(NotifyError::Rejected(error.to_string()));
        }
        Ok(())
    }
}
