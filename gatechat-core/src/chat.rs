//! The chat page's state as one owned object.
//!
//! Everything the chat view needs (catalog, access grant, selected agent,
//! test toggle, history, in-flight bookkeeping) lives in [`ChatState`] and is
//! changed only through its methods. Network I/O stays outside: callers take
//! the [`Dispatch`] from [`ChatState::submit`], deliver it however they like
//! and feed the result back through [`ChatState::finish`].

use std::time::Instant;

use serde_json::Value;
use uuid::Uuid;

use crate::access::{AccessGate, GateOutcome};
use crate::config::GateConfig;
use crate::error::{GateError, GateResult};
use crate::models::{AccessCode, AccessGrant, Agent, ChatSession};
use crate::pipeline::{Completion, Dispatch, SendPipeline, Submission};
use crate::relay::AgentTransport;
use crate::store::SessionStore;

#[derive(Debug)]
pub struct ChatState {
    agents: Vec<Agent>,
    gate: AccessGate,
    selected: Option<String>,
    test_mode: bool,
    store: SessionStore,
    pipeline: SendPipeline,
}

fn find_agent<'a>(agents: &'a [Agent], id: &str) -> GateResult<&'a Agent> {
    agents
        .iter()
        .find(|a| a.id == id)
        .ok_or_else(|| GateError::UnknownAgent(id.to_string()))
}

impl ChatState {
    pub fn new(agents: Vec<Agent>, codes: Vec<AccessCode>, context_window: usize) -> Self {
        Self {
            agents,
            gate: AccessGate::new(codes),
            selected: None,
            test_mode: false,
            store: SessionStore::new(),
            pipeline: SendPipeline::new(context_window),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            config.agents.clone(),
            config.access_codes.clone(),
            config.client.context_window,
        )
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    pub fn unlock(&mut self, code: &str, now: Instant) -> GateOutcome {
        let outcome = self.gate.attempt(code, now);
        if matches!(outcome, GateOutcome::Granted(_)) {
            self.select_default_agent();
        }
        outcome
    }

    /// Merge a grant obtained from the remote code checker.
    pub fn apply_grant(&mut self, grant: &AccessGrant) {
        self.gate.apply(grant);
        self.select_default_agent();
    }

    fn select_default_agent(&mut self) {
        let still_allowed = self
            .selected
            .as_deref()
            .is_some_and(|id| self.gate.allows(id));
        if !still_allowed {
            let first = self.visible_agents().first().map(|a| a.id.clone());
            self.selected = first;
        }
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut AccessGate {
        &mut self.gate
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn visible_agents(&self) -> Vec<&Agent> {
        self.gate.visible_agents(&self.agents)
    }

    // ------------------------------------------------------------------
    // Selection and toggles
    // ------------------------------------------------------------------

    pub fn selected_agent(&self) -> Option<&Agent> {
        self.selected
            .as_deref()
            .and_then(|id| self.agents.iter().find(|a| a.id == id))
    }

    pub fn select_agent(&mut self, id: &str) -> GateResult<()> {
        find_agent(&self.agents, id)?;
        if !self.gate.allows(id) {
            return Err(GateError::AgentLocked(id.to_string()));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    fn current(&self) -> GateResult<&Agent> {
        match self.selected.as_deref() {
            Some(id) => find_agent(&self.agents, id),
            None => Err(GateError::NoAgentSelected),
        }
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn toggle_test_mode(&mut self) -> bool {
        self.test_mode = !self.test_mode;
        self.test_mode
    }

    pub fn is_loading(&self) -> bool {
        self.selected
            .as_deref()
            .is_some_and(|id| self.pipeline.is_loading(id))
    }

    pub fn queued(&self) -> Option<&str> {
        self.selected.as_deref().and_then(|id| self.pipeline.queued(id))
    }

    // ------------------------------------------------------------------
    // Sessions of the selected agent
    // ------------------------------------------------------------------

    pub fn sessions(&self) -> &[ChatSession] {
        match self.selected.as_deref() {
            Some(id) => self.store.sessions(id),
            None => &[],
        }
    }

    pub fn active_session(&self) -> Option<&ChatSession> {
        let agent = self.selected.as_deref()?;
        let id = self.store.active_session(agent)?;
        self.store.session(agent, id)
    }

    pub fn new_session(&mut self) -> GateResult<Uuid> {
        let id = self.current()?.id.clone();
        Ok(self.store.new_session(&id))
    }

    pub fn delete_session(&mut self, session: Uuid) -> GateResult<()> {
        let id = self.current()?.id.clone();
        self.store.delete_session(&id, session)
    }

    pub fn select_session(&mut self, session: Uuid) -> GateResult<()> {
        let id = self.current()?.id.clone();
        self.store.select_session(&id, session)
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Submit text to the selected agent.
    pub fn submit(&mut self, text: &str) -> GateResult<Submission> {
        let agent_id = self.current()?.id.clone();
        let agent = find_agent(&self.agents, &agent_id)?;
        self.pipeline
            .submit(&mut self.store, agent, text, self.test_mode)
    }

    /// Record a dispatch's outcome. The returned completion may carry the
    /// next dispatch when a queued message was drained.
    pub fn finish(&mut self, dispatch: &Dispatch, outcome: GateResult<Value>) -> GateResult<Completion> {
        let agent = find_agent(&self.agents, &dispatch.agent_id)?;
        self.pipeline
            .finish(&mut self.store, agent, dispatch, outcome, self.test_mode)
    }

    /// Submit and wait for the reply, following any drained queue entries.
    pub async fn send(
        &mut self,
        transport: &dyn AgentTransport,
        text: &str,
    ) -> GateResult<Vec<Completion>> {
        let mut completions = Vec::new();
        let mut pending = match self.submit(text)? {
            Submission::Dispatched(d) => Some(d),
            _ => None,
        };
        while let Some(dispatch) = pending.take() {
            tracing::debug!(
                transport = transport.name(),
                agent = %dispatch.agent_id,
                context = dispatch.messages.len(),
                "Delivering message"
            );
            let outcome = transport.deliver(&dispatch).await;
            let completion = self.finish(&dispatch, outcome)?;
            pending = completion.next.clone();
            completions.push(completion);
        }
        Ok(completions)
    }
}
