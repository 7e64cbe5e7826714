//! Post message tool: sends a reply into the conversation's thread.
//!
//! The destination comes from the [`MessageContext`] stored on the thread,
//! never from the arguments, so the LLM cannot post somewhere else.
//! Interactive elements in `blocks` (anything with an `action_id`) are
//! registered as active buttons so a later click can be matched to them.

use async_trait::async_trait;
use std::sync::Arc;
use threadclaw_core::channel::Channel;
use threadclaw_core::error::ToolError;
use threadclaw_core::message::{MessageContext, extract_message_text};
use threadclaw_core::thread::ThreadState;
use threadclaw_core::tool::Tool;
use tracing::debug;

const NAME: &str = "post_message";

pub struct PostMessageTool {
    channel: Arc<dyn Channel>,
}

impl PostMessageTool {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Tool for PostMessageTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Post a message to the user in the current thread. Provide plain `text`, or `blocks` for rich content with buttons."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The message text"
                },
                "blocks": {
                    "type": "array",
                    "description": "Structured content blocks; elements with an action_id become buttons",
                    "items": { "type": "object" }
                },
                "reasoning": {
                    "type": "string",
                    "description": "Why this message is being sent"
                }
            }
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
        let has_blocks = !arguments["blocks"].is_null();
        let content = extract_message_text(&arguments);
        if content.is_empty() && !has_blocks {
            return Err(ToolError::InvalidArguments(
                "post_message needs 'text' or 'blocks'".into(),
            ));
        }

        let context = current_context(state, NAME)?;
        let message_id = self
            .channel
            .send(&context.channel_id, &content, Some(context.thread_id.as_str()))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        state.mark_sent(message_id.clone());
        let buttons = register_buttons(state, &arguments["blocks"], &message_id);
        debug!(thread_id = %state.thread_id(), %message_id, buttons, "Message posted");

        Ok(serde_json::json!({
            "ok": true,
            "message_id": message_id,
            "channel": context.channel_id,
            "buttons": buttons,
        }))
    }
}

/// The context of the conversation a message tool is acting in.
pub(crate) fn current_context(state: &ThreadState, tool_name: &str) -> Result<MessageContext, ToolError> {
    state.context().ok_or_else(|| ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: "no message context on this thread".into(),
    })
}

/// Register every `blocks[].elements[].action_id` (and a block-level
/// `accessory.action_id`) as an active button. Returns how many.
pub(crate) fn register_buttons(state: &mut ThreadState, blocks: &serde_json::Value, message_id: &str) -> usize {
    let blocks = match blocks {
        serde_json::Value::String(raw) => serde_json::from_str(raw).unwrap_or_default(),
        other => other.clone(),
    };
    let Some(blocks) = blocks.as_array() else {
        return 0;
    };

    let mut count = 0;
    for block in blocks {
        let elements = block["elements"].as_array().into_iter().flatten();
        for element in elements.chain(std::iter::once(&block["accessory"])) {
            if let Some(action_id) = element["action_id"].as_str() {
                state.register_button(
                    action_id,
                    serde_json::json!({
                        "message_id": message_id,
                        "element": element,
                    }),
                );
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingChannel, state_with_context};
    use serde_json::json;

    #[tokio::test]
    async fn posts_text_into_the_thread() {
        let channel = Arc::new(RecordingChannel::new());
        let tool = PostMessageTool::new(channel.clone());
        let mut state = state_with_context("t1");

        let out = tool.execute(json!({"text": "Hello"}), &mut state).await.unwrap();

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, "C1");
        assert_eq!(sent[0].content, "Hello");
        assert_eq!(sent[0].thread_id.as_deref(), Some("t1"));
        assert_eq!(out["message_id"], "msg-1");
        assert!(state.was_sent_by_us("msg-1"));
    }

    #[tokio::test]
    async fn registers_buttons_from_blocks() {
        let channel = Arc::new(RecordingChannel::new());
        let tool = PostMessageTool::new(channel.clone());
        let mut state = state_with_context("t1");
        let blocks = json!([
            {"type": "section", "text": {"type": "mrkdwn", "text": "Deploy?"}},
            {"type": "actions", "elements": [
                {"type": "button", "action_id": "deploy_yes", "text": {"type": "plain_text", "text": "Yes"}},
                {"type": "button", "action_id": "deploy_no", "text": {"type": "plain_text", "text": "No"}}
            ]}
        ]);

        let out = tool.execute(json!({"blocks": blocks}), &mut state).await.unwrap();

        assert_eq!(out["buttons"], 2);
        assert_eq!(state.active_buttons(), vec!["deploy_no", "deploy_yes"]);
        assert_eq!(channel.sent()[0].content, "Deploy?\nYes\nNo");
    }

    #[tokio::test]
    async fn requires_content() {
        let tool = PostMessageTool::new(Arc::new(RecordingChannel::new()));
        let mut state = state_with_context("t1");
        let err = tool.execute(json!({"reasoning": "x"}), &mut state).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn requires_context() {
        let tool = PostMessageTool::new(Arc::new(RecordingChannel::new()));
        let mut state = ThreadState::new("t1");
        let err = tool.execute(json!({"text": "hi"}), &mut state).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn delivery_failure_is_an_execution_failure() {
        let tool = PostMessageTool::new(Arc::new(RecordingChannel::failing()));
        let mut state = state_with_context("t1");
        let err = tool.execute(json!({"text": "hi"}), &mut state).await.unwrap_err();
        assert!(err.to_string().contains("offline"));
        assert!(state.sent_message_ids().is_empty());
    }
}
