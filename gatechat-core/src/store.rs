//! In-memory chat history: agent -> sessions -> messages, with one active
//! session pointer per agent. Nothing here does I/O.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{GateError, GateResult};
use crate::models::{ChatSession, Message};

#[derive(Debug, Default)]
struct AgentSessions {
    /// Creation order; the last entry is the most recent.
    sessions: Vec<ChatSession>,
    active: Option<Uuid>,
}

impl AgentSessions {
    fn create(&mut self) -> Uuid {
        let session = ChatSession::new();
        let id = session.id;
        self.sessions.push(session);
        self.active = Some(id);
        id
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    agents: HashMap<String, AgentSessions>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active session for the agent, creating an empty one if there is none.
    pub fn ensure_session(&mut self, agent: &str) -> Uuid {
        let entry = self.agents.entry(agent.to_string()).or_default();
        match entry.active {
            Some(id) => id,
            None => entry.create(),
        }
    }

    /// Always create and activate a fresh session.
    pub fn new_session(&mut self, agent: &str) -> Uuid {
        let id = self.agents.entry(agent.to_string()).or_default().create();
        tracing::debug!(agent, session = %id, "Created chat session");
        id
    }

    /// Remove a session. If it was active, the most recent remaining session
    /// becomes active, or none if the agent has no sessions left.
    pub fn delete_session(&mut self, agent: &str, id: Uuid) -> GateResult<()> {
        let entry = self
            .agents
            .get_mut(agent)
            .ok_or_else(|| not_found(agent, id))?;
        let pos = entry
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| not_found(agent, id))?;
        entry.sessions.remove(pos);

        if entry.active == Some(id) {
            entry.active = entry.sessions.last().map(|s| s.id);
        }
        Ok(())
    }

    pub fn append_message(&mut self, agent: &str, session: Uuid, message: Message) -> GateResult<()> {
        let target = self
            .agents
            .get_mut(agent)
            .and_then(|e| e.sessions.iter_mut().find(|s| s.id == session))
            .ok_or_else(|| not_found(agent, session))?;
        target.push(message);
        Ok(())
    }

    pub fn select_session(&mut self, agent: &str, id: Uuid) -> GateResult<()> {
        let entry = self
            .agents
            .get_mut(agent)
            .filter(|e| e.sessions.iter().any(|s| s.id == id))
            .ok_or_else(|| not_found(agent, id))?;
        entry.active = Some(id);
        Ok(())
    }

    pub fn active_session(&self, agent: &str) -> Option<Uuid> {
        self.agents.get(agent).and_then(|e| e.active)
    }

    /// Sessions for an agent in creation order.
    pub fn sessions(&self, agent: &str) -> &[ChatSession] {
        self.agents
            .get(agent)
            .map(|e| e.sessions.as_slice())
            .unwrap_or(&[])
    }

    pub fn session(&self, agent: &str, id: Uuid) -> Option<&ChatSession> {
        self.sessions(agent).iter().find(|s| s.id == id)
    }
}

fn not_found(agent: &str, session: Uuid) -> GateError {
    GateError::SessionNotFound {
        agent: agent.to_string(),
        session,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_session_is_idempotent() {
        let mut store = SessionStore::new();
        let a = store.ensure_session("halovision");
        let b = store.ensure_session("halovision");
        assert_eq!(a, b);
        assert_eq!(store.sessions("halovision").len(), 1);
        assert_eq!(store.active_session("halovision"), Some(a));
    }

    #[test]
    fn test_sessions_are_per_agent() {
        let mut store = SessionStore::new();
        let a = store.ensure_session("halovision");
        let b = store.ensure_session("chiroli");
        assert_ne!(a, b);
        assert!(store.session("chiroli", a).is_none());
    }

    #[test]
    fn test_new_session_leaves_existing_untouched() {
        let mut store = SessionStore::new();
        let first = store.ensure_session("chiroli");
        store
            .append_message("chiroli", first, Message::user("back pain question"))
            .unwrap();
        let before = store.session("chiroli", first).unwrap().clone();

        let second = store.new_session("chiroli");
        assert_ne!(first, second);
        assert_eq!(store.active_session("chiroli"), Some(second));

        let after = store.session("chiroli", first).unwrap();
        assert_eq!(after.title, before.title);
        assert_eq!(after.messages, before.messages);
        assert!(store.session("chiroli", second).unwrap().messages.is_empty());
    }

    #[test]
    fn test_append_sets_title_from_first_message() {
        let mut store = SessionStore::new();
        let id = store.ensure_session("safe3d");
        store
            .append_message("safe3d", id, Message::user("How do I calibrate the scanner head?"))
            .unwrap();
        store
            .append_message("safe3d", id, Message::agent("Start with the reference sphere."))
            .unwrap();
        let session = store.session("safe3d", id).unwrap();
        assert_eq!(session.title, "How do I calibrate the scanner...");
        assert_eq!(session.messages.len(), 2);
    }

    #[test]
    fn test_append_to_unknown_session_fails() {
        let mut store = SessionStore::new();
        store.ensure_session("safe3d");
        let err = store
            .append_message("safe3d", Uuid::new_v4(), Message::user("hi"))
            .unwrap_err();
        assert!(matches!(err, GateError::SessionNotFound { .. }));
    }

    #[test]
    fn test_delete_active_falls_back_to_most_recent() {
        let mut store = SessionStore::new();
        let s1 = store.new_session("halovision");
        let s2 = store.new_session("halovision");
        let s3 = store.new_session("halovision");

        store.delete_session("halovision", s3).unwrap();
        assert_eq!(store.active_session("halovision"), Some(s2));

        store.delete_session("halovision", s2).unwrap();
        assert_eq!(store.active_session("halovision"), Some(s1));

        store.delete_session("halovision", s1).unwrap();
        assert_eq!(store.active_session("halovision"), None);
        assert!(store.sessions("halovision").is_empty());
    }

    #[test]
    fn test_delete_inactive_keeps_pointer() {
        let mut store = SessionStore::new();
        let s1 = store.new_session("halovision");
        let s2 = store.new_session("halovision");
        store.delete_session("halovision", s1).unwrap();
        assert_eq!(store.active_session("halovision"), Some(s2));
    }

    #[test]
    fn test_delete_unknown_session_fails() {
        let mut store = SessionStore::new();
        assert!(store.delete_session("halovision", Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_select_session() {
        let mut store = SessionStore::new();
        let s1 = store.new_session("chiroli");
        store.new_session("chiroli");
        store.select_session("chiroli", s1).unwrap();
        assert_eq!(store.active_session("chiroli"), Some(s1));
        assert!(store.select_session("chiroli", Uuid::new_v4()).is_err());
    }
}
