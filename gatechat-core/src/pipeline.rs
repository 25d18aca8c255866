//! Send pipeline: optimistic append, one request in flight per agent, and a
//! single-slot queue for text submitted while a reply is pending.
//!
//! Per agent: `Idle -> Sending -> Idle`. The queue slot can only be filled
//! while `Sending` and is drained exactly once when the agent returns to
//! `Idle`. A further submission while the slot is full replaces the queued
//! text; the displaced text is handed back to the caller.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::error::GateResult;
use crate::models::{Agent, ChatTurn, Message};
use crate::reply::extract_reply;
use crate::store::SessionStore;

/// Number of trailing messages sent to the agent as context.
pub const CONTEXT_WINDOW: usize = 10;

pub const ERROR_REPLY: &str = "Something went wrong connecting to the agent. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendPhase {
    #[default]
    Idle,
    Sending,
}

#[derive(Debug, Default)]
struct SendSlot {
    phase: SendPhase,
    queued: Option<String>,
}

/// An outbound request produced by [`SendPipeline::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub agent_id: String,
    pub session_id: Uuid,
    pub webhook_url: String,
    pub test_mode: bool,
    pub messages: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Dispatched(Dispatch),
    Queued { displaced: Option<String> },
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub session_id: Uuid,
    pub reply: Message,
    /// Set when a queued message was drained and sent.
    pub next: Option<Dispatch>,
}

#[derive(Debug)]
pub struct SendPipeline {
    slots: HashMap<String, SendSlot>,
    context_window: usize,
}

impl Default for SendPipeline {
    fn default() -> Self {
        Self::new(CONTEXT_WINDOW)
    }
}

impl SendPipeline {
    pub fn new(context_window: usize) -> Self {
        Self {
            slots: HashMap::new(),
            context_window: context_window.max(1),
        }
    }

    pub fn phase(&self, agent_id: &str) -> SendPhase {
        self.slots
            .get(agent_id)
            .map(|s| s.phase)
            .unwrap_or_default()
    }

    pub fn is_loading(&self, agent_id: &str) -> bool {
        self.phase(agent_id) == SendPhase::Sending
    }

    pub fn queued(&self, agent_id: &str) -> Option<&str> {
        self.slots.get(agent_id).and_then(|s| s.queued.as_deref())
    }

    pub fn submit(
        &mut self,
        store: &mut SessionStore,
        agent: &Agent,
        text: &str,
        test_mode: bool,
    ) -> GateResult<Submission> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Submission::Ignored);
        }

        let slot = self.slots.entry(agent.id.clone()).or_default();
        if slot.phase == SendPhase::Sending {
            let displaced = slot.queued.replace(text.to_string());
            if let Some(lost) = &displaced {
                tracing::warn!(
                    agent = %agent.id,
                    displaced = %lost,
                    "Queued message replaced before it was sent"
                );
            }
            return Ok(Submission::Queued { displaced });
        }

        let session_id = store.ensure_session(&agent.id);
        store.append_message(&agent.id, session_id, Message::user(text))?;
        slot.phase = SendPhase::Sending;

        let messages = store
            .session(&agent.id, session_id)
            .map(|s| {
                let skip = s.messages.len().saturating_sub(self.context_window);
                s.messages[skip..].iter().map(Message::to_turn).collect()
            })
            .unwrap_or_default();

        let dispatch = Dispatch {
            agent_id: agent.id.clone(),
            session_id,
            webhook_url: agent.webhook_for(test_mode).to_string(),
            test_mode,
            messages,
        };
        tracing::debug!(agent = %agent.id, session = %session_id, "Dispatching message");
        Ok(Submission::Dispatched(dispatch))
    }

    /// Record the outcome of a dispatch, return the agent to idle and drain
    /// the queue slot.
    pub fn finish(
        &mut self,
        store: &mut SessionStore,
        agent: &Agent,
        dispatch: &Dispatch,
        outcome: GateResult<Value>,
        test_mode: bool,
    ) -> GateResult<Completion> {
        let reply = match outcome {
            Ok(data) => Message::agent(extract_reply(&data)),
            Err(e) => {
                tracing::error!(agent = %dispatch.agent_id, error = %e, "Agent request failed");
                Message::agent(ERROR_REPLY)
            }
        };

        if let Err(e) = store.append_message(&dispatch.agent_id, dispatch.session_id, reply.clone()) {
            tracing::warn!(error = %e, "Reply arrived for a deleted session; dropping it");
        }

        let queued = {
            let slot = self.slots.entry(dispatch.agent_id.clone()).or_default();
            slot.phase = SendPhase::Idle;
            slot.queued.take()
        };

        let next = match queued {
            Some(text) => match self.submit(store, agent, &text, test_mode)? {
                Submission::Dispatched(d) => Some(d),
                _ => None,
            },
            None => None,
        };

        Ok(Completion {
            session_id: dispatch.session_id,
            reply,
            next,
        })
    }
}
