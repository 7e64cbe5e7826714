//! CLI channel: interactive terminal chat.
//!
//! Reads lines from stdin and prints outbound messages. Every line belongs
//! to one thread (`cli_session` unless told otherwise), so a terminal
//! session is a single conversation.

use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;
use threadclaw_core::channel::{Channel, ChannelId, ChannelMessage};
use threadclaw_core::error::ChannelError;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const DEFAULT_THREAD: &str = "cli_session";

/// Interactive CLI channel for terminal-based chat.
pub struct CliChannel {
    id: ChannelId,
    thread_id: String,
    output: Mutex<Box<dyn Write + Send>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    /// Print outbound messages to `output` instead of stdout.
    pub fn with_output(output: Box<dyn Write + Send>) -> Self {
        Self {
            id: ChannelId("cli".into()),
            thread_id: DEFAULT_THREAD.into(),
            output: Mutex::new(output),
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Wrap one line typed by the local user.
    pub fn message(&self, line: impl Into<String>) -> ChannelMessage {
        local_message(&self.id, &self.thread_id, line.into())
    }

    fn print(&self, text: &str) -> Result<(), ChannelError> {
        let mut out = self
            .output
            .lock()
            .map_err(|_| ChannelError::ConnectionLost("output lock poisoned".into()))?;
        writeln!(out, "{text}")
            .and_then(|_| out.flush())
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "cli".into(),
                reason: e.to_string(),
            })
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

fn local_message(channel_id: &ChannelId, thread_id: &str, content: String) -> ChannelMessage {
    ChannelMessage {
        channel_id: channel_id.clone(),
        sender_id: "local_user".into(),
        content,
        chat_id: "cli".into(),
        message_id: Some(uuid::Uuid::new_v4().to_string()),
        thread_id: Some(thread_id.to_string()),
        metadata: serde_json::Map::new(),
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        let channel_id = self.id.clone();
        let thread_id = self.thread_id.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(io::stdin()).lines();

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if matches!(line.as_str(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
                            break;
                        }

                        let msg = local_message(&channel_id, &thread_id, line);
                        if tx.send(Ok(msg)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF (Ctrl+D)
                    Err(e) => {
                        let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn send(
        &self,
        _chat_id: &str,
        content: &str,
        _thread_id: Option<&str>,
    ) -> Result<String, ChannelError> {
        self.print(content)?;
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn update(&self, _chat_id: &str, message_id: &str, content: &str) -> Result<(), ChannelError> {
        let short: String = message_id.chars().take(8).collect();
        self.print(&format!("(edited {short}) {content}"))
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true
    }
}
