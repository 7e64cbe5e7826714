//! Domain event system: decoupled observation of conversation runs.
//!
//! Events are published when something interesting happens in a loop run.
//! Other components can subscribe to react without tight coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An inbound message was accepted for a thread
    MessageReceived {
        thread_id: String,
        user_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool actually ran
    ToolExecuted {
        thread_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A call matched the ledger and was answered from it
    ToolReplayed {
        thread_id: String,
        tool_name: String,
        timestamp: DateTime<Utc>,
    },

    /// The loop entered error recovery
    ErrorRecovery {
        thread_id: String,
        iteration: u32,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A loop run finished
    LoopCompleted {
        thread_id: String,
        reason: String,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
