//! Webex Messages API client

use async_trait::async_trait;

use super::{ChatMessage, ChatSink, NotifyError};
use crate::config::WebexConfig;

/// Posts messages to Webex rooms
#[derive(Clone)]
pub struct WebexClient {
    client: reqwest::Client,
    messages_url: String,
    token: String,
}

impl WebexClient {
    pub fn new(config: &WebexConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            messages_url: format!("{}/messages", config.url.trim_end_matches('/')),
            token: config.token.clone(),
        })
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }
}

#[async_trait]
impl ChatSink for WebexClient {
    async fn send(&self, message: &ChatMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(&self.token)
            .json(message)
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(room_id = %message.room_id, "Chat message sent");

        Ok(())
    }
}
