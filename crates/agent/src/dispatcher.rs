//! Inbound adapter: turns a platform event into a loop run on its thread.

use chrono::Utc;
use std::sync::Arc;
use threadclaw_core::error::Error;
use threadclaw_core::event::{DomainEvent, EventBus};
use threadclaw_core::message::{MessageContext, TurnRecord};
use threadclaw_core::store::ThreadStateStore;
use tracing::{debug, info};

use crate::loop_runner::{ConversationLoop, LoopOutcome};

/// Result of handling one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing ran: our own echo, or a click on a button that is gone
    Ignored,
    Completed(LoopOutcome),
}

pub struct ThreadDispatcher {
    store: Arc<ThreadStateStore>,
    conversation: ConversationLoop,
    event_bus: Arc<EventBus>,
}

impl ThreadDispatcher {
    pub fn new(store: Arc<ThreadStateStore>, conversation: ConversationLoop, event_bus: Arc<EventBus>) -> Self {
        Self {
            store,
            conversation,
            event_bus,
        }
    }

    pub fn store(&self) -> &Arc<ThreadStateStore> {
        &self.store
    }

    /// Handle one inbound event.
    ///
    /// The thread's state stays locked for the whole loop run, so two
    /// events on the same thread are processed one after the other.
    pub async fn handle(&self, context: MessageContext) -> Result<Dispatch, Error> {
        let shared = self.store.get_or_create(context.thread_id.clone()).await;
        let mut state = shared.lock().await;

        if let Some(message_id) = context.message_id.as_deref() {
            if state.was_sent_by_us(message_id) {
                debug!(thread_id = %context.thread_id, message_id, "Ignoring our own message");
                return Ok(Dispatch::Ignored);
            }
        }

        let mut turn = TurnRecord::user(context.text.clone()).with_user_id(context.user_id.clone());
        if context.is_button_click() {
            let Some(action_id) = context.action_id.as_deref() else {
                return Ok(Dispatch::Ignored);
            };
            if !state.resolve_button(action_id) {
                debug!(thread_id = %context.thread_id, action_id, "Ignoring click on inactive button");
                return Ok(Dispatch::Ignored);
            }
            turn = turn.as_button_action();
        }

        state.set_context(&context)?;
        state.add_message(turn);

        info!(
            thread_id = %context.thread_id,
            user_id = %context.user_id,
            message_type = ?context.message_type,
            "Message received"
        );
        self.event_bus.publish(DomainEvent::MessageReceived {
            thread_id: context.thread_id.to_string(),
            user_id: context.user_id.clone(),
            content_preview: context.text.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        let outcome = self.conversation.run(&mut state).await?;
        Ok(Dispatch::Completed(outcome))
    }
}
