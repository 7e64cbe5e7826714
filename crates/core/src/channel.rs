//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects ThreadClaw to a messaging platform. It yields
//! inbound [`ChannelMessage`]s and carries outbound posts and edits made
//! by message tools.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;
use crate::message::{MessageContext, MessageType, ThreadId};

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from a channel, still in channel terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// The text content
    pub content: String,

    /// The chat/group/DM identifier within the channel
    pub chat_id: String,

    /// Platform message id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Thread root this message replies in, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Platform-specific metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ChannelMessage {
    /// Normalize into a [`MessageContext`].
    ///
    /// Threaded replies are keyed by their thread root; top-level messages
    /// start a thread keyed by their own id, falling back to the chat id.
    pub fn into_context(self) -> MessageContext {
        let is_threaded = self.thread_id.is_some();
        let thread_key = self
            .thread_id
            .clone()
            .or_else(|| self.message_id.clone())
            .unwrap_or_else(|| self.chat_id.clone());

        MessageContext {
            user_id: self.sender_id,
            channel_id: self.chat_id,
            thread_id: ThreadId(thread_key),
            message_id: self.message_id,
            timestamp: Utc::now(),
            text: self.content,
            is_threaded_conversation: is_threaded,
            message_type: if is_threaded {
                MessageType::ThreadReply
            } else {
                MessageType::DirectMessage
            },
            action_id: None,
            extra: self.metadata,
        }
    }
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "cli", "slack").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Post a message, optionally inside a thread. Returns the platform
    /// id of the new message.
    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        thread_id: Option<&str>,
    ) -> std::result::Result<String, ChannelError>;

    /// Replace the content of a message we posted earlier.
    async fn update(
        &self,
        _chat_id: &str,
        _message_id: &str,
        _content: &str,
    ) -> std::result::Result<(), ChannelError> {
        Err(ChannelError::Unsupported {
            channel: self.name().to_string(),
            operation: "update".into(),
        })
    }

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }
}
