//! # ThreadClaw Core
//!
//! Domain types, traits, and error definitions for the ThreadClaw
//! conversation runtime. Every collaborator of the orchestration loop
//! (LLM client, tools, channels) is a trait here; implementations live in
//! their own crates.
//!
//! The stateful pieces are here too: [`ThreadState`] (history, execution
//! ledger, metadata, buttons) and the [`ThreadStateStore`] that hands out
//! one state per conversation.

pub mod error;
pub mod message;
pub mod thread;
pub mod store;
pub mod provider;
pub mod channel;
pub mod tool;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{extract_message_text, MessageContext, MessageType, ThreadId, TurnRecord};
pub use thread::{ExecutionRecord, Fingerprint, ThreadState};
pub use store::{EvictionPolicy, SharedThreadState, ThreadStateStore};
pub use provider::{LlmClient, NextAction, ToolDefinition};
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use tool::{Tool, ToolCall, ToolRegistry};
pub use event::{DomainEvent, EventBus};
