pub mod access;
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod relay;
pub mod reply;
pub mod store;

pub use access::{AccessGate, GateOutcome};
pub use chat::ChatState;
pub use config::GateConfig;
pub use error::{GateError, GateResult};
pub use models::{AccessCode, AccessGrant, Agent, ChatSession, ChatTurn, CodeVerdict, Message, Role};
pub use pipeline::{Completion, Dispatch, SendPhase, SendPipeline, Submission};
pub use relay::{AgentTransport, CodeCheckerClient, ProxyTransport, WebhookClient};
pub use reply::extract_reply;
pub use store::SessionStore;
