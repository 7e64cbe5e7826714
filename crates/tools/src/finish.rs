//! Finish tool: the terminal action that ends a conversation run.

use async_trait::async_trait;
use chrono::Utc;
use threadclaw_core::error::ToolError;
use threadclaw_core::thread::ThreadState;
use threadclaw_core::tool::Tool;

pub const DEFAULT_SUMMARY: &str = "Task completed";

/// Marks the run complete. Has no other side effect.
pub struct FinishTool {
    name: String,
}

impl FinishTool {
    pub fn new() -> Self {
        Self::named("finish")
    }

    /// Register the terminal tool under a different name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for FinishTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FinishTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "End the conversation turn. Call this once the user's request has been handled."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "One sentence describing what was done"
                },
                "reasoning": {
                    "type": "string",
                    "description": "Why the conversation is complete"
                }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _state: &mut ThreadState,
    ) -> Result<serde_json::Value, ToolError> {
        let summary = arguments["summary"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SUMMARY);

        Ok(serde_json::json!({
            "complete": true,
            "timestamp": Utc::now().to_rfc3339(),
            "summary": summary,
        }))
    }
}
