//! LLM client implementations for ThreadClaw.
//!
//! All clients implement the `threadclaw_core::LlmClient` trait.
//! [`build_from_config`] picks the endpoint from configuration.

pub mod openai_compat;

use std::sync::Arc;
use threadclaw_config::AppConfig;
use threadclaw_core::error::ProviderError;
use threadclaw_core::provider::{LlmClient, ToolDefinition};

pub use openai_compat::OpenAiCompatClient;

/// Build the configured LLM client, offering it `tools`.
///
/// A local Ollama endpoint needs no key; every other endpoint does.
pub fn build_from_config(
    config: &AppConfig,
    tools: Vec<ToolDefinition>,
) -> Result<Arc<dyn LlmClient>, ProviderError> {
    let client = match endpoint_name(&config.api_url) {
        "ollama" => OpenAiCompatClient::ollama(Some(&config.api_url), &config.model)?,
        name => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    ProviderError::NotConfigured(
                        "no API key; set THREADCLAW_API_KEY or api_key in config.toml".into(),
                    )
                })?;
            if name == "openrouter" {
                OpenAiCompatClient::openrouter(api_key, &config.model)?
            } else {
                OpenAiCompatClient::new(name, &config.api_url, api_key, &config.model)?
            }
        }
    };

    let client = client
        .with_tools(tools)
        .with_system_prompt(&config.agent.system_prompt)
        .with_history_window(config.agent.history_window)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    Ok(Arc::new(client))
}

/// Whether the configured endpoint cannot be used without an API key.
pub fn needs_api_key(config: &AppConfig) -> bool {
    endpoint_name(&config.api_url) != "ollama" && !config.has_api_key()
}

fn endpoint_name(api_url: &str) -> &'static str {
    if api_url.contains("openrouter.ai") {
        "openrouter"
    } else if api_url.contains("api.openai.com") {
        "openai"
    } else if api_url.contains("localhost:11434") {
        "ollama"
    } else {
        "openai_compat"
    }
}
