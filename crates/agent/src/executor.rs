//! Tool execution with at-most-once semantics per distinct call.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use threadclaw_core::error::ToolError;
use threadclaw_core::event::{DomainEvent, EventBus};
use threadclaw_core::thread::{ExecutionError, Fingerprint, ThreadState};
use threadclaw_core::tool::ToolRegistry;
use tracing::{debug, warn};

use crate::normalize::normalize;

/// What happened when a call was handed to the executor.
#[derive(Debug, Clone)]
pub struct Execution {
    pub tool_name: String,
    pub fingerprint: Fingerprint,
    /// The normalized arguments the tool saw (or would have seen)
    pub arguments: serde_json::Value,
    pub result: serde_json::Value,
    /// Answered from the ledger without invoking the tool
    pub replayed: bool,
}

/// Normalizes, deduplicates, dispatches, and records tool calls.
pub struct ToolExecutor {
    tools: Arc<ToolRegistry>,
    timeout: Duration,
    event_bus: Option<Arc<EventBus>>,
}

impl ToolExecutor {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            timeout: Duration::from_secs(30),
            event_bus: None,
        }
    }

    /// Upper bound on a single tool invocation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Execute `tool_name` with `raw_args` against `state`.
    ///
    /// A call whose fingerprint is already in the ledger is not run again;
    /// the stored result comes back with `replayed = true`. Every real
    /// invocation, successful or not, is in the ledger before this returns.
    /// Tool failures are re-raised as [`ToolError::ExecutionFailed`]
    /// (or [`ToolError::Timeout`]).
    pub async fn execute(
        &self,
        tool_name: &str,
        raw_args: serde_json::Value,
        state: &mut ThreadState,
    ) -> Result<Execution, ToolError> {
        let (fingerprint, arguments) = match normalize(tool_name, raw_args.clone()) {
            Ok(normalized) => {
                let arguments = normalized.into_value();
                (Fingerprint::of(tool_name, &arguments), arguments)
            }
            Err(err) => {
                // Malformed proposals are keyed by their raw arguments; a
                // repeat is answered from the ledger below.
                let fingerprint = Fingerprint::of(tool_name, &raw_args);
                if !state.has_executed(&fingerprint) {
                    warn!(thread_id = %state.thread_id(), tool = tool_name, error = %err, "Rejected malformed arguments");
                    state.record_failure(fingerprint, tool_name, raw_args, ExecutionError::from(&err));
                    return Err(err);
                }
                (fingerprint, raw_args)
            }
        };

        if let Some(record) = state.ledger().get(&fingerprint) {
            debug!(thread_id = %state.thread_id(), tool = tool_name, %fingerprint, "Duplicate call, returning stored result");
            let result = record.result.clone();
            self.publish(DomainEvent::ToolReplayed {
                thread_id: state.thread_id().to_string(),
                tool_name: tool_name.to_string(),
                timestamp: Utc::now(),
            });
            return Ok(Execution {
                tool_name: tool_name.to_string(),
                fingerprint,
                arguments,
                result,
                replayed: true,
            });
        }

        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, tool.execute(arguments.clone(), state)).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = match outcome {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool_name: tool_name.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }),
        };

        self.publish(DomainEvent::ToolExecuted {
            thread_id: state.thread_id().to_string(),
            tool_name: tool_name.to_string(),
            success: outcome.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match outcome {
            Ok(result) => {
                debug!(thread_id = %state.thread_id(), tool = tool_name, duration_ms, "Tool executed");
                state.record_success(fingerprint.clone(), tool_name, arguments.clone(), result.clone());
                Ok(Execution {
                    tool_name: tool_name.to_string(),
                    fingerprint,
                    arguments,
                    result,
                    replayed: false,
                })
            }
            Err(err) => {
                warn!(thread_id = %state.thread_id(), tool = tool_name, error = %err, "Tool execution failed");
                state.record_failure(fingerprint, tool_name, arguments, ExecutionError::from(&err));
                Err(into_execution_failure(tool_name, err))
            }
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

fn into_execution_failure(tool_name: &str, err: ToolError) -> ToolError {
    if err.is_execution_failure() {
        return err;
    }
    ToolError::ExecutionFailed {
        tool_name: tool_name.to_string(),
        reason: err.to_string(),
    }
}
