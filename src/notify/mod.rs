//! Chat delivery
//!
//! Messages are fire-and-forget: a send either succeeds or returns an error,
//! nothing from the response body is kept.

pub mod webex;

use async_trait::async_trait;
use serde::Serialize;

pub use webex::WebexClient;

/// A message addressed to one room
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl ChatMessage {
    pub fn new(room_id: impl Into<String>, body: MessageBody) -> Self {
        Self {
            room_id: room_id.into(),
            body,
        }
    }
}

/// Message payload, sent either as plain text or rendered markdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageBody {
    Text(String),
    Markdown(String),
}

impl MessageBody {
    /// Message content regardless of format
    pub fn as_str(&self) -> &str {
        match self {
            MessageBody::Text(s) | MessageBody::Markdown(s) => s,
        }
    }
}

/// A destination that can deliver chat messages
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, message: &ChatMessage) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Failed to send message: {0}")]
    Network(String),

    #[error("Chat API returned status {status}: {body}")]
    Status { status: u16, body: String },
}
