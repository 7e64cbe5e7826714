//! LLM client trait: the abstraction over "what should happen next".
//!
//! An [`LlmClient`] looks at the whole [`ThreadState`] (history and
//! execution ledger) and proposes zero or more tool calls. Prompt
//! construction and transport are the implementation's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::thread::ThreadState;
use crate::tool::ToolCall;

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// The LLM's proposal for one iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NextAction {
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl NextAction {
    /// A proposal with no calls: the loop stops.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn call(call: ToolCall) -> Self {
        Self {
            tool_calls: vec![call],
            reasoning: None,
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core LLM client trait.
///
/// Must be callable repeatedly; every call sees the state as it is now.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Propose the next action for the conversation.
    async fn next_action(&self, state: &ThreadState) -> std::result::Result<NextAction, ProviderError>;
}
