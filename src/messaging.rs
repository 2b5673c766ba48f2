use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: String,
}

impl TextMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            message_type: "text".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessageRequest {
    pub to: String,
    pub messages: Vec<TextMessage>,
}

impl PushMessageRequest {
    pub fn text(to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            messages: vec![TextMessage::new(text)],
        }
    }
}

/// Error body returned by the Messaging API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Outbound push delivery. The webhook only depends on this trait so it can
/// be driven without a network in tests.
#[async_trait]
pub trait PushApi: Send + Sync {
    async fn push_message(&self, request: &PushMessageRequest) -> Result<()>;
}

pub struct MessagingClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl MessagingClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }
}

#[async_trait]
impl PushApi for MessagingClient {
    async fn push_message(&self, request: &PushMessageRequest) -> Result<()> {
        let url = format!("{}/v2/bot/message/push", self.base_url);

        debug!("Sending push message to {} via {}", request.to, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .context("Failed to send request to Messaging API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&error_body)
                .map(|b| b.message)
                .unwrap_or(error_body);
            anyhow::bail!("Messaging API error ({}): {}", status, detail);
        }

        Ok(())
    }
}
