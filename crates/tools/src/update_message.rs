//! Update message tool: edits a message this thread posted earlier.

use async_trait::async_trait;
use std::sync::Arc;
use threadclaw_core::channel::Channel;
use threadclaw_core::error::ToolError;
use threadclaw_core::message::extract_message_text;
use threadclaw_core::thread::ThreadState;
use threadclaw_core::tool::Tool;

use crate::post_message::{current_context, register_buttons};

const NAME: &str = "update_message";

pub struct UpdateMessageTool {
    channel: Arc<dyn Channel>,
}

impl UpdateMessageTool {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Tool for UpdateMessageTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Replace the content of a message previously posted in this thread."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message_id": {
                    "type": "string",
                    "description": "Id returned by post_message"
                },
                "text": { "type": "string" },
                "blocks": { "type": "array", "items": { "type": "object" } },
                "reasoning": { "type": "string" }
            },
            "required": ["message_id"]
        })
    }

    fn posts_message(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        state: &mut ThreadState,
    ) -> Result<serde_json::Value, ToolError> {
        let message_id = arguments["message_id"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'message_id' argument".into()))?;

        if !state.was_sent_by_us(message_id) {
            return Err(ToolError::InvalidArguments(format!(
                "message '{message_id}' was not posted in this thread"
            )));
        }

        let content = extract_message_text(&arguments);
        if content.is_empty() && arguments["blocks"].is_null() {
            return Err(ToolError::InvalidArguments(
                "update_message needs 'text' or 'blocks'".into(),
            ));
        }

        let context = current_context(state, NAME)?;
        self.channel
            .update(&context.channel_id, message_id, &content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        let buttons = register_buttons(state, &arguments["blocks"], message_id);
        Ok(serde_json::json!({
            "ok": true,
            "message_id": message_id,
            "buttons": buttons,
        }))
    }
}
