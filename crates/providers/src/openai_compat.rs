//! OpenAI-compatible LLM client.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, and any endpoint that
//! exposes `/chat/completions` with function calling.
//!
//! Each request is rebuilt from the thread state: the system prompt
//! (plus the conversation context and any open buttons), the last
//! `history_window` turns, and a digest of the recent ledger so the model
//! can see what has already been done.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use threadclaw_core::error::ProviderError;
use threadclaw_core::message::TurnRecord;
use threadclaw_core::provider::{LlmClient, NextAction, ToolDefinition, Usage};
use threadclaw_core::thread::{ExecutionRecord, ThreadState};
use threadclaw_core::tool::ToolCall;
use tracing::{debug, warn};

const LEDGER_DIGEST_LEN: usize = 10;
const RESULT_PREVIEW_CHARS: usize = 400;

/// An [`LlmClient`] backed by an OpenAI-compatible endpoint.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: String,
    history_window: usize,
    tools: Vec<ToolDefinition>,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a client for `model` at `base_url`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            system_prompt: String::new(),
            history_window: 20,
            tools: Vec::new(),
            client,
        })
    }

    /// Create an OpenRouter client (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an Ollama client (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }

    /// The tools the model may call.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.history_window = turns;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Render the chat-completions body for `state`.
    fn build_body(&self, state: &ThreadState) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": self.to_api_messages(state),
            "temperature": self.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !self.tools.is_empty() {
            body["tools"] = serde_json::json!(to_api_tools(&self.tools));
            body["tool_choice"] = serde_json::json!("auto");
        }

        body
    }

    fn to_api_messages(&self, state: &ThreadState) -> Vec<ApiMessage> {
        let mut messages = vec![ApiMessage::new("system", self.system_message(state))];

        messages.extend(state.recent_messages(self.history_window).iter().map(turn_to_api));

        let recent = state.recent_executions(LEDGER_DIGEST_LEN);
        if !recent.is_empty() {
            let mut digest = String::from(
                "Tool calls already made in this thread (identical calls return the stored result):",
            );
            for (_, record) in recent {
                digest.push('\n');
                digest.push_str(&describe_execution(record));
            }
            messages.push(ApiMessage::new("system", digest));
        }

        messages
    }

    fn system_message(&self, state: &ThreadState) -> String {
        let mut prompt = self.system_prompt.clone();

        if let Some(ctx) = state.context() {
            prompt.push_str(&format!(
                "\n\nConversation: thread {} in channel {}, current user {}.",
                ctx.thread_id, ctx.channel_id, ctx.user_id
            ));
        }

        let buttons = state.active_buttons();
        if !buttons.is_empty() {
            prompt.push_str(&format!(
                "\nButtons awaiting a click: {}.",
                buttons.join(", ")
            ));
        }

        prompt
    }
}

fn turn_to_api(turn: &TurnRecord) -> ApiMessage {
    if turn.is_system_note {
        return ApiMessage::new("system", turn.text.clone());
    }
    if turn.is_user {
        let text = if turn.is_button_action {
            format!("[clicked button] {}", turn.text)
        } else {
            turn.text.clone()
        };
        return ApiMessage::new("user", text);
    }
    ApiMessage::new("assistant", turn.text.clone())
}

fn describe_execution(record: &ExecutionRecord) -> String {
    let outcome = match &record.error {
        Some(err) => format!("FAILED ({}): {}", err.kind, err.message),
        None => preview(&record.result.to_string()),
    };
    format!("- {}({}) -> {}", record.tool_name, record.arguments, outcome)
}

fn preview(s: &str) -> String {
    if s.chars().count() <= RESULT_PREVIEW_CHARS {
        return s.to_string();
    }
    let cut: String = s.chars().take(RESULT_PREVIEW_CHARS).collect();
    format!("{cut}...")
}

/// Convert tool definitions to OpenAI API format.
fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
    tools
        .iter()
        .map(|t| ApiToolDefinition {
            r#type: "function".into(),
            function: ApiToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

/// Arguments arrive as a JSON string. Anything that does not parse is
/// passed through as a string for the normalizer to judge.
fn parse_arguments(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn to_next_action(response: ApiResponse) -> Result<(NextAction, Option<Usage>), ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    // Free text stays on the action, not the calls, so it never becomes
    // part of a call's fingerprint.
    let reasoning = choice.message.content.filter(|c| !c.trim().is_empty());
    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            tool: tc.function.name,
            parameters: parse_arguments(&tc.function.arguments),
            reasoning: None,
        })
        .collect();

    let usage = response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok((NextAction { tool_calls, reasoning }, usage))
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(5)
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_action(&self, state: &ThreadState) -> Result<NextAction, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(state);

        debug!(
            provider = %self.name,
            model = %self.model,
            thread_id = %state.thread_id(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after(response.headers()),
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let (action, usage) = to_next_action(api_response)?;
        debug!(
            provider = %self.name,
            calls = action.tool_calls.len(),
            total_tokens = usage.map(|u| u.total_tokens).unwrap_or_default(),
            "Completion received"
        );
        Ok(action)
    }
}

// --- API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
}

impl ApiMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.into(),
            content: Some(content),
            tool_calls: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: ApiFunction,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use threadclaw_core::message::MessageContext;
    use threadclaw_core::thread::Fingerprint;

    fn client() -> OpenAiCompatClient {
        OpenAiCompatClient::openrouter("sk-test", "test-model")
            .unwrap()
            .with_system_prompt("Be brief.")
            .with_history_window(2)
    }

    #[test]
    fn openrouter_constructor() {
        let c = client();
        assert_eq!(c.name(), "openrouter");
        assert!(c.base_url().contains("openrouter.ai"));
    }

    #[test]
    fn ollama_constructor() {
        let c = OpenAiCompatClient::ollama(None, "llama3").unwrap();
        assert_eq!(c.name(), "ollama");
        assert!(c.base_url().contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let c = OpenAiCompatClient::new("x", "http://host/v1/", "k", "m").unwrap();
        assert_eq!(c.base_url(), "http://host/v1");
    }

    #[test]
    fn history_is_windowed_after_system_prompt() {
        let mut state = ThreadState::new("t1");
        state.add_message(TurnRecord::user("one"));
        state.add_message(TurnRecord::assistant("two"));
        state.add_message(TurnRecord::user("three").as_button_action());

        let messages = client().to_api_messages(&state);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content.as_deref(), Some("Be brief."));
        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages[2].content.as_deref(), Some("[clicked button] three"));
    }

    #[test]
    fn context_and_buttons_reach_the_system_prompt() {
        let mut state = ThreadState::new("t1");
        state
            .set_context(&MessageContext::new("U9", "C3", "t1", "hi"))
            .unwrap();
        state.register_button("approve", json!({}));

        let prompt = client().system_message(&state);
        assert!(prompt.contains("channel C3"));
        assert!(prompt.contains("user U9"));
        assert!(prompt.contains("approve"));
    }

    #[test]
    fn ledger_digest_lists_recent_calls() {
        let mut state = ThreadState::new("t1");
        let args = json!({"text": "hi"});
        state.record_success(Fingerprint::of("post_message", &args), "post_message", args, json!({"ok": true}));

        let messages = client().to_api_messages(&state);
        let digest = messages.last().unwrap().content.clone().unwrap();
        assert!(digest.contains("post_message"));
        assert!(digest.contains(r#"{"ok":true}"#));
    }

    #[test]
    fn body_includes_tools() {
        let c = client().with_max_tokens(256).with_tools(vec![ToolDefinition {
            name: "finish".into(),
            description: "End the run".into(),
            parameters: json!({"type": "object"}),
        }]);
        let body = c.build_body(&ThreadState::new("t1"));
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "finish");
    }

    #[test]
    fn response_maps_to_next_action() {
        let response: ApiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Replying first",
                    "tool_calls": [
                        {"id": "c1", "type": "function", "function": {"name": "post_message", "arguments": "{\"text\":\"hi\"}"}},
                        {"id": "c2", "type": "function", "function": {"name": "finish", "arguments": ""}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        let (action, usage) = to_next_action(response).unwrap();
        assert_eq!(action.reasoning.as_deref(), Some("Replying first"));
        assert_eq!(action.tool_calls.len(), 2);
        assert_eq!(action.tool_calls[0].tool, "post_message");
        assert_eq!(action.tool_calls[0].parameters, json!({"text": "hi"}));
        assert!(action.tool_calls[0].reasoning.is_none());
        assert_eq!(action.tool_calls[1].parameters, serde_json::Value::Null);
        assert_eq!(usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn text_only_response_proposes_nothing() {
        let response: ApiResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "All done."}}]
        }))
        .unwrap();
        let (action, _) = to_next_action(response).unwrap();
        assert!(action.tool_calls.is_empty());
    }

    #[test]
    fn empty_choices_is_an_api_error() {
        let response: ApiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(to_next_action(response), Err(ProviderError::ApiError { .. })));
    }

    #[test]
    fn unparseable_arguments_pass_through() {
        assert_eq!(parse_arguments("{not json"), json!("{not json"));
        assert_eq!(parse_arguments("[1,2]"), json!([1, 2]));
    }
}
