use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent {0} is locked; enter an access code that grants it")]
    AgentLocked(String),

    #[error("No agent selected")]
    NoAgentSelected,

    #[error("Session {session} not found for agent {agent}")]
    SessionNotFound { agent: String, session: Uuid },

    #[error("Relay error ({status}): {message}")]
    Relay { status: u16, message: String },

    #[error("Invalid access code")]
    InvalidCode,
}

pub type GateResult<T> = Result<T, GateError>;
