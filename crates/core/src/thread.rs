//! Per-conversation state: history, execution ledger, metadata, buttons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::ToolError;
use crate::message::{MessageContext, ThreadId, TurnRecord};

/// Metadata key the inbound adapter stores the current [`MessageContext`] under.
pub const CONTEXT_KEY: &str = "context";

/// Canonical key for one distinct tool call: `"{tool}:{canonical json}"`.
///
/// Object keys are sorted at every depth, so two argument objects with the
/// same content always produce the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(tool_name: &str, arguments: &serde_json::Value) -> Self {
        let mut key = format!("{tool_name}:");
        write_canonical(arguments, &mut key);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error detail stored with a failed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub message: String,
    pub kind: String,
}

impl From<&ToolError> for ExecutionError {
    fn from(err: &ToolError) -> Self {
        Self {
            message: err.to_string(),
            kind: err.kind().to_string(),
        }
    }
}

/// Outcome of one tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    /// `Null` when the execution failed
    pub result: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub error: Option<ExecutionError>,
}

impl ExecutionRecord {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Fingerprint → record map that remembers insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionLedger {
    records: HashMap<Fingerprint, ExecutionRecord>,
    order: Vec<Fingerprint>,
}

impl ExecutionLedger {
    /// Insert a record. A fingerprint is written at most once; a second
    /// insert for the same key is ignored and returns `false`.
    pub fn insert(&mut self, fingerprint: Fingerprint, record: ExecutionRecord) -> bool {
        if self.records.contains_key(&fingerprint) {
            return false;
        }
        self.order.push(fingerprint.clone());
        self.records.insert(fingerprint, record);
        true
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.records.contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&ExecutionRecord> {
        self.records.get(fingerprint)
    }

    /// The last `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<(&Fingerprint, &ExecutionRecord)> {
        let start = self.order.len().saturating_sub(n);
        self.order[start..]
            .iter()
            .filter_map(|fp| self.records.get(fp).map(|r| (fp, r)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, &ExecutionRecord)> {
        self.order
            .iter()
            .filter_map(|fp| self.records.get(fp).map(|r| (fp, r)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonState {
    Active,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonEntry {
    pub state: ButtonState,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Everything known about one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadState {
    thread_id: ThreadId,
    messages: Vec<TurnRecord>,
    ledger: ExecutionLedger,
    metadata: serde_json::Map<String, serde_json::Value>,
    buttons: HashMap<String, ButtonEntry>,
    sent_message_ids: HashSet<String>,
    created_at: DateTime<Utc>,
}

impl ThreadState {
    pub fn new(thread_id: impl Into<ThreadId>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            ledger: ExecutionLedger::default(),
            metadata: serde_json::Map::new(),
            buttons: HashMap::new(),
            sent_message_ids: HashSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // ── Messages ──────────────────────────────────────────────────────

    /// Append a turn. Positions never go backwards: a missing position is
    /// assigned as previous + 1, a smaller explicit one is raised to the
    /// previous value.
    pub fn add_message(&mut self, mut record: TurnRecord) {
        let last = self
            .messages
            .iter()
            .rev()
            .find_map(|m| m.thread_position)
            .unwrap_or(0);

        record.thread_position = Some(match record.thread_position {
            None => last + 1,
            Some(p) if p < last => {
                debug!(thread_id = %self.thread_id, given = p, last, "Clamping out-of-order thread position");
                last
            }
            Some(p) => p,
        });
        self.messages.push(record);
    }

    pub fn messages(&self) -> &[TurnRecord] {
        &self.messages
    }

    /// The last `n` turns, oldest first.
    pub fn recent_messages(&self, n: usize) -> &[TurnRecord] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    // ── Ledger ────────────────────────────────────────────────────────

    pub fn ledger(&self) -> &ExecutionLedger {
        &self.ledger
    }

    pub fn has_executed(&self, fingerprint: &Fingerprint) -> bool {
        self.ledger.contains(fingerprint)
    }

    pub fn get_result(&self, fingerprint: &Fingerprint) -> Option<&serde_json::Value> {
        self.ledger.get(fingerprint).map(|r| &r.result)
    }

    pub fn recent_executions(&self, n: usize) -> Vec<(&Fingerprint, &ExecutionRecord)> {
        self.ledger.recent(n)
    }

    /// Record a successful execution. Returns `false` if the fingerprint
    /// was already present.
    pub fn record_success(
        &mut self,
        fingerprint: Fingerprint,
        tool_name: &str,
        arguments: serde_json::Value,
        result: serde_json::Value,
    ) -> bool {
        self.ledger.insert(
            fingerprint,
            ExecutionRecord {
                tool_name: tool_name.to_string(),
                arguments,
                result,
                timestamp: Utc::now(),
                error: None,
            },
        )
    }

    /// Record a failed execution with a `Null` result.
    pub fn record_failure(
        &mut self,
        fingerprint: Fingerprint,
        tool_name: &str,
        arguments: serde_json::Value,
        error: ExecutionError,
    ) -> bool {
        self.ledger.insert(
            fingerprint,
            ExecutionRecord {
                tool_name: tool_name.to_string(),
                arguments,
                result: serde_json::Value::Null,
                timestamp: Utc::now(),
                error: Some(error),
            },
        )
    }

    // ── Metadata ──────────────────────────────────────────────────────

    pub fn metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn set_context(&mut self, context: &MessageContext) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(context)?;
        self.metadata.insert(CONTEXT_KEY.to_string(), value);
        Ok(())
    }

    /// The current inbound context, if one is stored and well-formed.
    pub fn context(&self) -> Option<MessageContext> {
        self.metadata
            .get(CONTEXT_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    // ── Buttons ───────────────────────────────────────────────────────

    pub fn register_button(&mut self, id: impl Into<String>, metadata: serde_json::Value) {
        self.buttons.insert(
            id.into(),
            ButtonEntry {
                state: ButtonState::Active,
                metadata,
            },
        );
    }

    /// Mark an active button resolved. Returns `true` only on the
    /// active → resolved transition.
    pub fn resolve_button(&mut self, id: &str) -> bool {
        match self.buttons.get_mut(id) {
            Some(entry) if entry.state == ButtonState::Active => {
                entry.state = ButtonState::Resolved;
                true
            }
            _ => false,
        }
    }

    pub fn button(&self, id: &str) -> Option<&ButtonEntry> {
        self.buttons.get(id)
    }

    pub fn active_buttons(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .buttons
            .iter()
            .filter(|(_, b)| b.state == ButtonState::Active)
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    // ── Our own output ────────────────────────────────────────────────

    pub fn mark_sent(&mut self, message_id: impl Into<String>) {
        self.sent_message_ids.insert(message_id.into());
    }

    pub fn was_sent_by_us(&self, message_id: &str) -> bool {
        self.sent_message_ids.contains(message_id)
    }

    pub fn sent_message_ids(&self) -> &HashSet<String> {
        &self.sent_message_ids
    }
}
