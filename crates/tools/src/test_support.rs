//! A channel double that records what the tools send.

use async_trait::async_trait;
use std::sync::Mutex;
use threadclaw_core::channel::{Channel, ChannelId, ChannelMessage};
use threadclaw_core::error::ChannelError;
use threadclaw_core::message::MessageContext;
use threadclaw_core::thread::ThreadState;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub chat_id: String,
    pub content: String,
    pub thread_id: Option<String>,
}

pub struct RecordingChannel {
    id: ChannelId,
    fail: bool,
    sent: Mutex<Vec<Sent>>,
    updated: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("recording".into()),
            fail: false,
            sent: Mutex::new(Vec::new()),
            updated: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn updated(&self) -> Vec<(String, String)> {
        self.updated.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(&self) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, chat_id: &str, content: &str, thread_id: Option<&str>) -> Result<String, ChannelError> {
        if self.fail {
            return Err(ChannelError::DeliveryFailed {
                channel: "recording".into(),
                reason: "offline".into(),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(Sent {
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            thread_id: thread_id.map(str::to_string),
        });
        Ok(format!("msg-{}", sent.len()))
    }

    async fn update(&self, _chat_id: &str, message_id: &str, content: &str) -> Result<(), ChannelError> {
        self.updated
            .lock()
            .unwrap()
            .push((message_id.to_string(), content.to_string()));
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true
    }
}

/// A thread state that already knows where it is talking.
pub fn state_with_context(thread: &str) -> ThreadState {
    let mut state = ThreadState::new(thread);
    state
        .set_context(&MessageContext::new("U1", "C1", thread, "hi"))
        .unwrap();
    state
}
