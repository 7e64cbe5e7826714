//! `threadclaw chat`: interactive or single-message chat in one thread.

use std::io::Write;
use std::sync::Arc;
use threadclaw_agent::{ConversationLoop, Dispatch, ThreadDispatcher};
use threadclaw_channels::CliChannel;
use threadclaw_config::AppConfig;
use threadclaw_core::channel::Channel;
use threadclaw_core::event::{DomainEvent, EventBus};
use threadclaw_core::store::ThreadStateStore;

pub async fn run(
    config: AppConfig,
    thread: String,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Check for API key early, give a clear error
    if threadclaw_providers::needs_api_key(&config) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    THREADCLAW_API_KEY   (generic)");
        eprintln!("    OPENAI_API_KEY       (for OpenAI direct)");
        eprintln!("    OPENROUTER_API_KEY   (for OpenRouter)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        eprintln!("  A local Ollama at http://localhost:11434/v1 needs no key.");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let channel = Arc::new(CliChannel::new().with_thread(thread));
    let tools = Arc::new(threadclaw_tools::default_registry(
        channel.clone(),
        &config.agent.terminal_tool,
    ));
    let llm = threadclaw_providers::build_from_config(&config, tools.definitions())?;

    let event_bus = Arc::new(EventBus::default());
    tokio::spawn(log_events(event_bus.subscribe()));

    let conversation =
        ConversationLoop::new(llm, tools.clone(), event_bus.clone()).with_config(&config.agent);
    let dispatcher = ThreadDispatcher::new(Arc::new(ThreadStateStore::new()), conversation, event_bus);

    if let Some(msg) = message {
        // Single message mode
        dispatcher.handle(channel.message(msg).into_context()).await?;
        return Ok(());
    }

    println!();
    println!("  ThreadClaw, interactive mode");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Thread:    {}", channel.thread_id());
    println!("  Tools:     {}", tools.names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut rx = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;
    prompt()?;

    while let Some(result) = rx.recv().await {
        match result {
            Ok(chan_msg) => {
                match dispatcher.handle(chan_msg.into_context()).await {
                    Ok(Dispatch::Completed(outcome)) => {
                        tracing::debug!(reason = outcome.reason.as_str(), iterations = outcome.iterations, "Turn complete");
                    }
                    Ok(Dispatch::Ignored) => {}
                    Err(e) => eprintln!("  [Error] {e}"),
                }
                prompt()?;
            }
            Err(e) => {
                eprintln!("  [Channel Error] {e}");
                break;
            }
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

async fn log_events(mut rx: tokio::sync::broadcast::Receiver<Arc<DomainEvent>>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event.as_ref() {
                DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
                    tracing::debug!(tool = %tool_name, success, duration_ms, "tool executed");
                }
                DomainEvent::ToolReplayed { tool_name, .. } => {
                    tracing::debug!(tool = %tool_name, "tool call replayed from ledger");
                }
                DomainEvent::ErrorRecovery { iteration, error_message, .. } => {
                    tracing::debug!(iteration, error = %error_message, "error recovery");
                }
                DomainEvent::LoopCompleted { .. } | DomainEvent::MessageReceived { .. } => {}
            },
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "event log fell behind");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
