//! Conversation value objects.
//!
//! An inbound platform event is normalized into a [`MessageContext`] by a
//! channel adapter. Everything the conversation has said or done is kept as
//! an ordered list of [`TurnRecord`]s on the thread state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable key for one logical conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry in a conversation's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// The text content
    pub text: String,

    /// User utterance (true) or assistant/system entry (false)
    pub is_user: bool,

    /// When the turn happened
    pub timestamp: DateTime<Utc>,

    /// 1-based sequence number within the thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_position: Option<u32>,

    /// Synthesized by the runtime rather than said by anyone
    #[serde(default)]
    pub is_system_note: bool,

    /// Originated from an interactive element click
    #[serde(default)]
    pub is_button_action: bool,

    /// Platform user id, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TurnRecord {
    fn new(text: impl Into<String>, is_user: bool) -> Self {
        Self {
            text: text.into(),
            is_user,
            timestamp: Utc::now(),
            thread_position: None,
            is_system_note: false,
            is_button_action: false,
            user_id: None,
        }
    }

    /// A user utterance.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, true)
    }

    /// Something the assistant communicated.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }

    /// A runtime-generated note.
    pub fn system_note(text: impl Into<String>) -> Self {
        Self {
            is_system_note: true,
            ..Self::new(text, false)
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.thread_position = Some(position);
        self
    }

    pub fn as_button_action(mut self) -> Self {
        self.is_button_action = true;
        self
    }
}

/// What kind of platform event produced a [`MessageContext`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    DirectMessage,
    Mention,
    ThreadReply,
    ButtonClick,
}

/// The normalized, platform-agnostic description of an inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContext {
    pub user_id: String,
    pub channel_id: String,
    pub thread_id: ThreadId,

    /// Platform id of the inbound message itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    pub timestamp: DateTime<Utc>,
    pub text: String,

    #[serde(default)]
    pub is_threaded_conversation: bool,

    #[serde(default)]
    pub message_type: MessageType,

    /// Interactive element id for button clicks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,

    /// Adapter-specific extras
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MessageContext {
    pub fn new(
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        thread_id: impl Into<ThreadId>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            thread_id: thread_id.into(),
            message_id: None,
            timestamp: Utc::now(),
            text: text.into(),
            is_threaded_conversation: false,
            message_type: MessageType::default(),
            action_id: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_button_click(&self) -> bool {
        self.message_type == MessageType::ButtonClick
    }
}

/// Human-readable text of a message payload.
///
/// Prefers a non-empty top-level `text`; otherwise gathers every string
/// stored under a `text` key inside `blocks` (which may also arrive as a
/// JSON-encoded string), one per line.
pub fn extract_message_text(payload: &serde_json::Value) -> String {
    if let Some(text) = payload.get("text").and_then(|v| v.as_str()) {
        if !text.trim().is_empty() {
            return text.to_string();
        }
    }

    let mut parts = Vec::new();
    match payload.get("blocks") {
        Some(serde_json::Value::String(raw)) => {
            if let Ok(blocks) = serde_json::from_str::<serde_json::Value>(raw) {
                collect_text(&blocks, &mut parts);
            }
        }
        Some(blocks) => collect_text(blocks, &mut parts),
        None => {}
    }
    parts.join("\n")
}

fn collect_text(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                collect_text(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                match v {
                    serde_json::Value::String(s) if key == "text" => {
                        if !s.trim().is_empty() {
                            out.push(s.clone());
                        }
                    }
                    serde_json::Value::Array(_) | serde_json::Value::Object(_) => collect_text(v, out),
                    _ => {}
                }
            }
        }
        _ => {}
    }
}
