//! The conversation loop: ask the LLM, run one tool, repeat.
//!
//! Each iteration asks the [`LlmClient`] for the next action, runs the
//! first proposed call through the [`ToolExecutor`], and then decides
//! whether the run is over. A run ends when:
//!
//! - the LLM proposes nothing,
//! - the terminal tool runs,
//! - a message has been posted and we are past the first iteration
//!   (the terminal tool is then invoked on the LLM's behalf),
//! - the iteration cap is hit (terminal tool forced, system note added),
//! - a failure occurred and the single recovery attempt has been made.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use threadclaw_config::AgentLoopConfig;
use threadclaw_core::error::{Error, ProviderError};
use threadclaw_core::event::{DomainEvent, EventBus};
use threadclaw_core::message::{TurnRecord, extract_message_text};
use threadclaw_core::provider::{LlmClient, NextAction};
use threadclaw_core::thread::{ExecutionError, Fingerprint, ThreadState};
use threadclaw_core::tool::{ToolCall, ToolRegistry};
use tracing::{debug, info, trace, warn};

use crate::executor::{Execution, ToolExecutor};

/// Default bound on tool dispatches per run.
pub const MAX_ITERATIONS: u32 = 10;

/// Default name of the tool that ends a run.
pub const DEFAULT_TERMINAL_TOOL: &str = "finish";

/// Reserved ledger tool name for failures that triggered recovery.
pub const ERROR_PSEUDO_TOOL: &str = "__error_recovery__";

pub const ITERATION_LIMIT_SUMMARY: &str = "Auto-completed due to iteration limit";

pub const MESSAGE_POSTED_SUMMARY: &str = "Auto-completed after posting a message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Iterating,
    Executing,
    ErrorRecovery,
    Completed,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The LLM called the terminal tool
    TerminalTool,
    /// The LLM proposed no calls
    NoAction,
    /// A message was posted after the first iteration
    MessagePosted,
    /// `max_iterations` dispatches without a terminal call
    IterationLimit,
    /// A failure was handed back to the LLM and its one remedy ran
    Recovered,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::TerminalTool => "terminal_tool",
            StopReason::NoAction => "no_action",
            StopReason::MessagePosted => "message_posted",
            StopReason::IterationLimit => "iteration_limit",
            StopReason::Recovered => "recovered",
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub phase: LoopPhase,
    pub reason: StopReason,
    /// Iterations started (LLM consultations outside recovery)
    pub iterations: u32,
    /// Calls handed to the executor, forced ones included
    pub dispatches: u32,
}

struct RunState {
    phase: LoopPhase,
    iteration: u32,
    dispatches: u32,
    posted: bool,
}

/// Drives one conversation thread to a stop.
pub struct ConversationLoop {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    event_bus: Arc<EventBus>,
    terminal_tool: String,
    max_iterations: u32,
    llm_timeout: Duration,
}

impl ConversationLoop {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            llm,
            executor: ToolExecutor::new(tools).with_event_bus(Arc::clone(&event_bus)),
            event_bus,
            terminal_tool: DEFAULT_TERMINAL_TOOL.to_string(),
            max_iterations: MAX_ITERATIONS,
            llm_timeout: Duration::from_secs(60),
        }
    }

    /// Apply the `[agent]` section of the config.
    pub fn with_config(self, config: &AgentLoopConfig) -> Self {
        self.with_max_iterations(config.max_iterations)
            .with_terminal_tool(&config.terminal_tool)
            .with_llm_timeout(Duration::from_secs(config.llm_timeout_secs))
            .with_tool_timeout(Duration::from_secs(config.tool_timeout_secs))
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_terminal_tool(mut self, name: impl Into<String>) -> Self {
        self.terminal_tool = name.into();
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.executor = self.executor.with_timeout(timeout);
        self
    }

    pub fn terminal_tool(&self) -> &str {
        &self.terminal_tool
    }

    /// Run the loop on `state` until it stops.
    ///
    /// Tool and LLM failures never escape directly: they are written to the
    /// ledger and handed back to the LLM once. An error is returned only if
    /// that recovery attempt fails or proposes nothing.
    pub async fn run(&self, state: &mut ThreadState) -> Result<LoopOutcome, Error> {
        info!(
            thread_id = %state.thread_id(),
            messages = state.messages().len(),
            executions = state.ledger().len(),
            "Starting conversation loop"
        );

        let mut run = RunState {
            phase: LoopPhase::Iterating,
            iteration: 0,
            dispatches: 0,
            posted: false,
        };

        while run.iteration < self.max_iterations {
            run.iteration += 1;
            debug!(thread_id = %state.thread_id(), iteration = run.iteration, "Loop iteration");

            match self.step(state, &mut run).await {
                Ok(None) => {}
                Ok(Some(reason)) => return Ok(self.stop(state, &mut run, reason)),
                Err(err) => return self.recover(state, &mut run, err).await,
            }
        }

        warn!(
            thread_id = %state.thread_id(),
            iterations = run.iteration,
            "Iteration limit reached, forcing completion"
        );
        if let Err(err) = self.force_terminal(state, &mut run, ITERATION_LIMIT_SUMMARY).await {
            return self.recover(state, &mut run, err).await;
        }
        state.add_message(TurnRecord::system_note(format!(
            "Conversation auto-completed after reaching the iteration limit ({}).",
            self.max_iterations
        )));
        Ok(self.stop(state, &mut run, StopReason::IterationLimit))
    }

    /// One iteration. `Ok(Some(_))` ends the run.
    async fn step(&self, state: &mut ThreadState, run: &mut RunState) -> Result<Option<StopReason>, Error> {
        enter(run, LoopPhase::Iterating);
        let action = self.ask(state).await?;
        let Some(call) = self.first_call(action) else {
            debug!(thread_id = %state.thread_id(), iteration = run.iteration, "No action proposed");
            return Ok(Some(StopReason::NoAction));
        };

        let execution = self.dispatch(state, run, call).await?;
        if execution.tool_name == self.terminal_tool {
            return Ok(Some(StopReason::TerminalTool));
        }

        if self.note_posted_message(state, &execution) {
            run.posted = true;
        }

        // A message posted earlier in this run ends it after any later step.
        if run.posted && run.iteration > 1 {
            self.force_terminal(state, run, MESSAGE_POSTED_SUMMARY).await?;
            return Ok(Some(StopReason::MessagePosted));
        }

        Ok(None)
    }

    async fn recover(&self, state: &mut ThreadState, run: &mut RunState, err: Error) -> Result<LoopOutcome, Error> {
        enter(run, LoopPhase::ErrorRecovery);
        warn!(
            thread_id = %state.thread_id(),
            iteration = run.iteration,
            error = %err,
            "Entering error recovery"
        );

        let arguments = json!({
            "iteration": run.iteration,
            "error": err.to_string(),
            "kind": err.kind(),
            "at": Utc::now().to_rfc3339(),
        });
        state.record_failure(
            Fingerprint::of(ERROR_PSEUDO_TOOL, &arguments),
            ERROR_PSEUDO_TOOL,
            arguments,
            ExecutionError {
                message: err.to_string(),
                kind: err.kind().to_string(),
            },
        );
        self.event_bus.publish(DomainEvent::ErrorRecovery {
            thread_id: state.thread_id().to_string(),
            iteration: run.iteration,
            error_message: err.to_string(),
            timestamp: Utc::now(),
        });

        let action = self.ask(state).await?;
        let Some(call) = self.first_call(action) else {
            warn!(thread_id = %state.thread_id(), "Recovery proposed no action, giving up");
            return Err(err);
        };

        let execution = self.dispatch(state, run, call).await?;
        if execution.tool_name == self.terminal_tool {
            return Ok(self.stop(state, run, StopReason::TerminalTool));
        }
        self.note_posted_message(state, &execution);
        Ok(self.stop(state, run, StopReason::Recovered))
    }

    async fn ask(&self, state: &ThreadState) -> Result<NextAction, Error> {
        match tokio::time::timeout(self.llm_timeout, self.llm.next_action(state)).await {
            Ok(action) => Ok(action?),
            Err(_) => Err(ProviderError::Timeout(format!(
                "{} gave no answer within {}s",
                self.llm.name(),
                self.llm_timeout.as_secs()
            ))
            .into()),
        }
    }

    /// Only the first proposed call is acted on.
    fn first_call(&self, action: NextAction) -> Option<ToolCall> {
        let mut calls = action.tool_calls.into_iter();
        let first = calls.next()?;
        let ignored = calls.count();
        if ignored > 0 {
            debug!(tool = %first.tool, ignored, "Ignoring additional proposed calls");
        }
        Some(first)
    }

    async fn dispatch(&self, state: &mut ThreadState, run: &mut RunState, call: ToolCall) -> Result<Execution, Error> {
        enter(run, LoopPhase::Executing);
        run.dispatches += 1;
        let ToolCall { tool, parameters, reasoning } = call;
        let raw = raw_arguments(parameters, reasoning);
        Ok(self.executor.execute(&tool, raw, state).await?)
    }

    async fn force_terminal(&self, state: &mut ThreadState, run: &mut RunState, summary: &str) -> Result<(), Error> {
        info!(thread_id = %state.thread_id(), summary, "Invoking terminal tool on the LLM's behalf");
        let call = ToolCall::new(self.terminal_tool.clone(), json!({ "summary": summary }));
        self.dispatch(state, run, call).await?;
        Ok(())
    }

    /// Append a turn for a message the conversation just saw us send.
    /// Replays sent nothing and are skipped.
    fn note_posted_message(&self, state: &mut ThreadState, execution: &Execution) -> bool {
        if execution.replayed {
            return false;
        }
        let posts = self
            .executor
            .tools()
            .get(&execution.tool_name)
            .is_some_and(|tool| tool.posts_message());
        if !posts {
            return false;
        }

        let text = extract_message_text(&execution.arguments);
        let text = if text.is_empty() {
            format!("[{}]", execution.tool_name)
        } else {
            text
        };
        state.add_message(TurnRecord::assistant(text));
        true
    }

    fn stop(&self, state: &ThreadState, run: &mut RunState, reason: StopReason) -> LoopOutcome {
        enter(run, LoopPhase::Completed);
        info!(
            thread_id = %state.thread_id(),
            reason = reason.as_str(),
            iterations = run.iteration,
            dispatches = run.dispatches,
            "Conversation loop finished"
        );
        self.event_bus.publish(DomainEvent::LoopCompleted {
            thread_id: state.thread_id().to_string(),
            reason: reason.as_str().to_string(),
            iterations: run.iteration,
            timestamp: Utc::now(),
        });
        LoopOutcome {
            phase: run.phase,
            reason,
            iterations: run.iteration,
            dispatches: run.dispatches,
        }
    }
}

fn enter(run: &mut RunState, phase: LoopPhase) {
    if run.phase != phase {
        trace!(from = ?run.phase, to = ?phase, iteration = run.iteration, "Loop transition");
        run.phase = phase;
    }
}

/// Fold the call-level reasoning into the arguments unless they carry
/// their own.
fn raw_arguments(parameters: serde_json::Value, reasoning: Option<String>) -> serde_json::Value {
    match (parameters, reasoning) {
        (serde_json::Value::Object(mut map), Some(reasoning)) => {
            map.entry("reasoning")
                .or_insert(serde_json::Value::String(reasoning));
            serde_json::Value::Object(map)
        }
        (serde_json::Value::Null, Some(reasoning)) => json!({ "reasoning": reasoning }),
        (parameters, _) => parameters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{CountingTool, FailingTool, ScriptedLlmClient};
    use threadclaw_core::error::ToolError;
    use threadclaw_core::thread::ThreadState;
    use threadclaw_tools::FinishTool;

    struct Fixture {
        finish: Arc<CountingTool>,
        lookup: Arc<CountingTool>,
        post: Arc<CountingTool>,
        boom: Arc<FailingTool>,
        registry: Arc<ToolRegistry>,
    }

    /// `finish` is a counting double here so tests can see how often the
    /// terminal tool ran.
    fn fixture() -> Fixture {
        let finish = Arc::new(CountingTool::new("finish"));
        let lookup = Arc::new(CountingTool::new("lookup"));
        let post = Arc::new(CountingTool::posting("post_message"));
        let boom = Arc::new(FailingTool::new("boom"));
        let mut registry = ToolRegistry::new();
        registry.register(finish.clone());
        registry.register(lookup.clone());
        registry.register(post.clone());
        registry.register(boom.clone());
        Fixture {
            finish,
            lookup,
            post,
            boom,
            registry: Arc::new(registry),
        }
    }

    fn conversation(llm: Arc<ScriptedLlmClient>, registry: Arc<ToolRegistry>) -> ConversationLoop {
        ConversationLoop::new(llm, registry, Arc::new(EventBus::default()))
    }

    fn call(tool: &str, params: serde_json::Value) -> ToolCall {
        ToolCall::new(tool, params)
    }

    #[tokio::test]
    async fn empty_proposal_stops_without_terminal_call() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(NextAction::none())]));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm.clone(), fx.registry).run(&mut state).await.unwrap();

        assert_eq!(outcome.reason, StopReason::NoAction);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.dispatches, 0);
        assert_eq!(outcome.phase, LoopPhase::Completed);
        assert_eq!(fx.finish.calls(), 0);
        assert_eq!(llm.call_count(), 1);
        assert!(state.ledger().is_empty());
    }

    #[tokio::test]
    async fn terminal_call_on_first_iteration_stops_immediately() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::repeating(call("finish", json!({"summary": "done"}))));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm.clone(), fx.registry.clone())
            .with_max_iterations(50)
            .run(&mut state)
            .await
            .unwrap();

        assert_eq!(outcome.reason, StopReason::TerminalTool);
        assert_eq!(outcome.phase, LoopPhase::Completed);
        assert_eq!(outcome.dispatches, 1);
        assert_eq!(fx.finish.calls(), 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn only_the_first_proposed_call_runs() {
        let fx = fixture();
        let action = NextAction {
            tool_calls: vec![call("lookup", json!({"q": 1})), call("finish", json!({}))],
            reasoning: None,
        };
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(action)]));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm, fx.registry.clone()).run(&mut state).await.unwrap();

        assert_eq!(fx.lookup.calls(), 1);
        assert_eq!(fx.finish.calls(), 0);
        assert_eq!(outcome.reason, StopReason::NoAction);
        assert_eq!(outcome.iterations, 2);
    }

    #[tokio::test]
    async fn iteration_limit_forces_completion() {
        let fx = fixture();
        // A fresh argument every time so nothing is deduplicated.
        let calls = (0..20).map(|i| call("lookup", json!({ "page": i }))).collect();
        let llm = Arc::new(ScriptedLlmClient::calls(calls));
        let registry = {
            let mut r = ToolRegistry::new();
            r.register(Arc::new(FinishTool::new()));
            r.register(fx.lookup.clone());
            Arc::new(r)
        };
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm.clone(), registry).run(&mut state).await.unwrap();

        assert_eq!(outcome.reason, StopReason::IterationLimit);
        assert_eq!(outcome.phase, LoopPhase::Completed);
        assert_eq!(outcome.iterations, MAX_ITERATIONS);
        assert_eq!(fx.lookup.calls(), MAX_ITERATIONS as usize);
        assert_eq!(llm.call_count(), MAX_ITERATIONS as usize);

        let forced = Fingerprint::of("finish", &json!({"summary": ITERATION_LIMIT_SUMMARY}));
        let record = state.ledger().get(&forced).expect("forced finish recorded");
        assert_eq!(record.result["complete"], true);
        assert_eq!(record.result["summary"], ITERATION_LIMIT_SUMMARY);

        let note = state.messages().last().unwrap();
        assert!(note.is_system_note);
        assert!(note.text.contains("iteration limit"));
    }

    #[tokio::test]
    async fn repeated_identical_calls_still_terminate() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::repeating(call("lookup", json!({"q": "same"}))));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm, fx.registry.clone())
            .with_max_iterations(4)
            .run(&mut state)
            .await
            .unwrap();

        assert_eq!(outcome.reason, StopReason::IterationLimit);
        assert_eq!(fx.lookup.calls(), 1);
        assert_eq!(fx.finish.calls(), 1);
        assert_eq!(state.ledger().len(), 2);
    }

    #[tokio::test]
    async fn message_posted_on_first_iteration_keeps_going() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::calls(vec![
            call("post_message", json!({"text": "On it"})),
            call("finish", json!({"summary": "answered"})),
        ]));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm, fx.registry.clone()).run(&mut state).await.unwrap();

        assert_eq!(outcome.reason, StopReason::TerminalTool);
        assert_eq!(fx.post.calls(), 1);
        assert_eq!(fx.finish.calls(), 1);
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].text, "On it");
        assert!(!state.messages()[0].is_user);
    }

    #[tokio::test]
    async fn message_after_first_iteration_completes_implicitly() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::calls(vec![
            call("lookup", json!({"q": "status"})),
            call("post_message", json!({"blocks": [{"type": "section", "text": {"type": "mrkdwn", "text": "All green"}}]})),
            call("lookup", json!({"q": "never"})),
        ]));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm.clone(), fx.registry.clone()).run(&mut state).await.unwrap();

        assert_eq!(outcome.reason, StopReason::MessagePosted);
        assert_eq!(outcome.phase, LoopPhase::Completed);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(llm.call_count(), 2);
        assert_eq!(fx.lookup.calls(), 1);
        assert_eq!(
            fx.finish.last_arguments(),
            Some(json!({"summary": MESSAGE_POSTED_SUMMARY}))
        );
        assert_eq!(state.messages()[0].text, "All green");
    }

    #[tokio::test]
    async fn earlier_post_completes_after_a_non_posting_tool() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::calls(vec![
            call("post_message", json!({"text": "Checking"})),
            call("lookup", json!({"q": "status"})),
            call("lookup", json!({"q": "again"})),
        ]));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm.clone(), fx.registry.clone()).run(&mut state).await.unwrap();

        assert_eq!(outcome.reason, StopReason::MessagePosted);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(llm.call_count(), 2);
        assert_eq!(fx.post.calls(), 1);
        assert_eq!(fx.lookup.calls(), 1);
        assert_eq!(fx.finish.calls(), 1);
        assert_eq!(
            fx.finish.last_arguments(),
            Some(json!({"summary": MESSAGE_POSTED_SUMMARY}))
        );
    }

    #[tokio::test]
    async fn tool_failure_gets_exactly_one_recovery() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::calls(vec![
            call("boom", json!({})),
            call("post_message", json!({"text": "Sorry, that failed"})),
            call("lookup", json!({"q": "not reached"})),
        ]));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm.clone(), fx.registry.clone()).run(&mut state).await.unwrap();

        assert_eq!(outcome.reason, StopReason::Recovered);
        assert_eq!(outcome.phase, LoopPhase::Completed);
        assert_eq!(llm.call_count(), 2);
        assert_eq!(fx.boom.calls(), 1);
        assert_eq!(fx.post.calls(), 1);
        assert_eq!(fx.lookup.calls(), 0);

        let errors: Vec<_> = state
            .ledger()
            .iter()
            .filter(|(_, r)| r.tool_name == ERROR_PSEUDO_TOOL)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1.error.as_ref().unwrap().kind, "ToolExecutionError");

        // The recovery request saw the tool failure and the recovery entry.
        assert_eq!(llm.ledger_sizes(), vec![0, 2]);
    }

    #[tokio::test]
    async fn recovery_honors_terminal_call() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::calls(vec![
            call("boom", json!({})),
            call("finish", json!({"summary": "gave up politely"})),
        ]));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm, fx.registry.clone()).run(&mut state).await.unwrap();

        assert_eq!(outcome.reason, StopReason::TerminalTool);
        assert_eq!(outcome.phase, LoopPhase::Completed);
        assert_eq!(fx.finish.calls(), 1);
    }

    #[tokio::test]
    async fn recovery_without_proposal_returns_original_error() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::calls(vec![call("boom", json!({}))]));
        let mut state = ThreadState::new("t1");

        let err = conversation(llm.clone(), fx.registry.clone()).run(&mut state).await.unwrap_err();

        assert!(matches!(err, Error::Tool(ToolError::ExecutionFailed { .. })));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn failing_recovery_is_not_retried() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::calls(vec![
            call("missing_tool", json!({})),
            call("boom", json!({})),
            call("finish", json!({})),
        ]));
        let mut state = ThreadState::new("t1");

        let err = conversation(llm.clone(), fx.registry.clone()).run(&mut state).await.unwrap_err();

        assert!(matches!(err, Error::Tool(ToolError::ExecutionFailed { .. })));
        assert_eq!(llm.call_count(), 2);
        assert_eq!(fx.boom.calls(), 1);
        assert_eq!(fx.finish.calls(), 0);
        let recovery = state
            .ledger()
            .iter()
            .find(|(_, r)| r.tool_name == ERROR_PSEUDO_TOOL)
            .unwrap();
        assert_eq!(recovery.1.error.as_ref().unwrap().kind, "ToolNotFoundError");
    }

    #[tokio::test]
    async fn llm_failure_enters_recovery() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::new(vec![
            Err(ProviderError::Network("connection reset".into())),
            Ok(NextAction::call(call("finish", json!({"summary": "recovered"})))),
        ]));
        let mut state = ThreadState::new("t1");

        let outcome = conversation(llm, fx.registry.clone()).run(&mut state).await.unwrap();

        assert_eq!(outcome.reason, StopReason::TerminalTool);
        let (_, entry) = state.recent_executions(2)[0];
        assert_eq!(entry.tool_name, ERROR_PSEUDO_TOOL);
        assert_eq!(entry.error.as_ref().unwrap().kind, "ProviderError");
    }

    #[tokio::test]
    async fn call_reasoning_reaches_the_tool() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::calls(vec![
            call("lookup", json!({"q": "x"})).with_reasoning("need data"),
        ]));
        let mut state = ThreadState::new("t1");

        conversation(llm, fx.registry.clone()).run(&mut state).await.unwrap();

        assert_eq!(
            fx.lookup.last_arguments(),
            Some(json!({"q": "x", "reasoning": "need data"}))
        );
    }

    #[tokio::test]
    async fn terminal_tool_name_is_configurable() {
        let fx = fixture();
        let llm = Arc::new(ScriptedLlmClient::repeating(call("lookup", json!({"q": 1}))));
        let mut state = ThreadState::new("t1");
        let config = AgentLoopConfig {
            terminal_tool: "lookup".into(),
            ..AgentLoopConfig::default()
        };

        let outcome = conversation(llm, fx.registry.clone())
            .with_config(&config)
            .run(&mut state)
            .await
            .unwrap();

        assert_eq!(outcome.reason, StopReason::TerminalTool);
        assert_eq!(fx.lookup.calls(), 1);
    }

    #[tokio::test]
    async fn completion_event_is_published() {
        let fx = fixture();
        let bus = Arc::new(EventBus::new(32));
        let mut rx = bus.subscribe();
        let llm = Arc::new(ScriptedLlmClient::new(vec![Ok(NextAction::none())]));
        let mut state = ThreadState::new("t1");

        ConversationLoop::new(llm, fx.registry.clone(), bus)
            .run(&mut state)
            .await
            .unwrap();

        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::LoopCompleted { reason, iterations, .. } => {
                assert_eq!(reason, "no_action");
                assert_eq!(*iterations, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn raw_arguments_prefers_explicit_reasoning() {
        assert_eq!(
            raw_arguments(json!({"reasoning": "own"}), Some("call".into())),
            json!({"reasoning": "own"})
        );
        assert_eq!(raw_arguments(serde_json::Value::Null, Some("r".into())), json!({"reasoning": "r"}));
        assert_eq!(raw_arguments(json!("[1]"), Some("r".into())), json!("[1]"));
    }
}
