pub mod agent;
pub mod grant;
pub mod message;
pub mod session;

pub use agent::{builtin_agents, Agent};
pub use grant::{AccessCode, AccessGrant, CodeVerdict};
pub use message::{ChatTurn, Message, Role};
pub use session::ChatSession;
