//! Built-in tool implementations for ThreadClaw.
//!
//! Tools are how the LLM acts on a conversation: reply in the thread,
//! edit an earlier reply, read back through the history, and finish
//! the run. Message tools talk to the platform through a [`Channel`].

pub mod finish;
pub mod post_message;
pub mod thread_history;
pub mod update_message;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use threadclaw_core::channel::Channel;
use threadclaw_core::tool::ToolRegistry;

pub use finish::FinishTool;
pub use post_message::PostMessageTool;
pub use thread_history::ThreadHistoryTool;
pub use update_message::UpdateMessageTool;

/// Create a registry with every built-in tool, message tools bound to
/// `channel` and the terminal tool registered as `terminal_tool`.
pub fn default_registry(channel: Arc<dyn Channel>, terminal_tool: &str) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FinishTool::named(terminal_tool)));
    registry.register(Arc::new(PostMessageTool::new(Arc::clone(&channel))));
    registry.register(Arc::new(UpdateMessageTool::new(channel)));
    registry.register(Arc::new(ThreadHistoryTool));
    registry
}
