//! Thread history tool: lets the LLM page back through the conversation.

use async_trait::async_trait;
use threadclaw_core::error::ToolError;
use threadclaw_core::thread::ThreadState;
use threadclaw_core::tool::Tool;

const DEFAULT_LIMIT: u64 = 10;
const MAX_LIMIT: u64 = 100;

pub struct ThreadHistoryTool;

#[async_trait]
impl Tool for ThreadHistoryTool {
    fn name(&self) -> &str {
        "get_thread_history"
    }

    fn description(&self) -> &str {
        "Read the most recent messages in this thread, oldest first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "How many messages to return (default: 10, max: 100)",
                    "default": DEFAULT_LIMIT
                }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        state: &mut ThreadState,
    ) -> Result<serde_json::Value, ToolError> {
        let limit = match &arguments["limit"] {
            serde_json::Value::Null => DEFAULT_LIMIT,
            value => value
                .as_u64()
                .filter(|n| *n > 0)
                .ok_or_else(|| ToolError::InvalidArguments("'limit' must be a positive integer".into()))?,
        }
        .min(MAX_LIMIT);

        let messages = state.recent_messages(limit as usize);
        let messages = serde_json::to_value(messages).map_err(|e| ToolError::ExecutionFailed {
            tool_name: "get_thread_history".into(),
            reason: e.to_string(),
        })?;

        Ok(serde_json::json!({
            "total": state.messages().len(),
            "messages": messages,
        }))
    }
}
