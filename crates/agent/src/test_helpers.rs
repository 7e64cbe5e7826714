//! Shared test doubles for the executor and loop tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use threadclaw_core::error::{ProviderError, ToolError};
use threadclaw_core::provider::{LlmClient, NextAction};
use threadclaw_core::thread::ThreadState;
use threadclaw_core::tool::{Tool, ToolCall};

/// An LLM client that replays a script of responses.
///
/// Once the script runs out it keeps returning the `then` action if one
/// was set, otherwise an empty proposal.
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<NextAction, ProviderError>>>,
    then: Option<NextAction>,
    calls: AtomicUsize,
    ledger_sizes: Mutex<Vec<usize>>,
}

impl ScriptedLlmClient {
    pub fn new(script: Vec<Result<NextAction, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            then: None,
            calls: AtomicUsize::new(0),
            ledger_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Propose these calls, one per iteration, then nothing.
    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self::new(calls.into_iter().map(|c| Ok(NextAction::call(c))).collect())
    }

    /// Propose the same call forever.
    pub fn repeating(call: ToolCall) -> Self {
        Self::new(vec![]).then(NextAction::call(call))
    }

    pub fn then(mut self, action: NextAction) -> Self {
        self.then = Some(action);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Ledger size observed at each call.
    pub fn ledger_sizes(&self) -> Vec<usize> {
        self.ledger_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn next_action(&self, state: &ThreadState) -> Result<NextAction, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ledger_sizes.lock().unwrap().push(state.ledger().len());
        match self.script.lock().unwrap().pop_front() {
            Some(next) => next,
            None => Ok(self.then.clone().unwrap_or_default()),
        }
    }
}

/// Records every invocation and echoes its arguments back.
pub struct CountingTool {
    name: String,
    posts: bool,
    calls: AtomicUsize,
    last: Mutex<Option<Value>>,
}

impl CountingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            posts: false,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// A tool the loop treats as message-posting.
    pub fn posting(name: &str) -> Self {
        Self {
            posts: true,
            ..Self::new(name)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_arguments(&self) -> Option<Value> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Counts invocations"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn posts_message(&self) -> bool {
        self.posts
    }

    async fn execute(&self, arguments: Value, state: &mut ThreadState) -> Result<Value, ToolError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last.lock().unwrap() = Some(arguments.clone());
        if self.posts {
            state.mark_sent(format!("{}-{n}", self.name));
        }
        Ok(json!({"ok": true, "call": n, "echo": arguments}))
    }
}

/// Always fails with a validation error.
pub struct FailingTool {
    name: String,
    calls: AtomicUsize,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Fails every time"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _arguments: Value, _state: &mut ThreadState) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ToolError::InvalidArguments(format!("{} always fails", self.name)))
    }
}

/// Sleeps before answering.
pub struct SlowTool {
    name: String,
    delay: Duration,
}

impl SlowTool {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Takes its time"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _arguments: Value, _state: &mut ThreadState) -> Result<Value, ToolError> {
        tokio::time::sleep(self.delay).await;
        Ok(Value::Null)
    }
}
