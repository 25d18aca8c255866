//! Interactive chat loop.
//!
//! Input and agent replies are multiplexed with `tokio::select!`, so lines
//! typed while a reply is pending reach the chat state and get queued there
//! instead of blocking the terminal.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use gatechat_core::{
    AgentTransport, ChatState, CodeCheckerClient, Completion, Dispatch, GateOutcome, GateResult,
    Role, Submission,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use uuid::Uuid;

// ============================================================================
// Input parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Help,
    Agents,
    Agent(String),
    New,
    Sessions,
    /// 1-based index into the session list
    Switch(usize),
    Delete(usize),
    Unlock(String),
    Test,
    Quit,
    Invalid(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Input::Text(line.to_string());
    };
    let mut parts = rest.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    let index = |arg: &str| match arg.parse::<usize>() {
        Ok(n) if n > 0 => Some(n),
        _ => None,
    };

    match (cmd, arg) {
        ("help", _) => Input::Help,
        ("agents", _) => Input::Agents,
        ("agent", id) if !id.is_empty() => Input::Agent(id.to_string()),
        ("new", _) => Input::New,
        ("sessions", _) => Input::Sessions,
        ("switch", n) => index(n).map(Input::Switch).unwrap_or_else(|| usage("/switch N")),
        ("delete", n) => index(n).map(Input::Delete).unwrap_or_else(|| usage("/delete N")),
        ("unlock", code) if !code.is_empty() => Input::Unlock(code.to_string()),
        ("test", _) => Input::Test,
        ("quit", _) | ("exit", _) => Input::Quit,
        _ => Input::Invalid(format!("unknown command: /{}", rest)),
    }
}

fn usage(form: &str) -> Input {
    Input::Invalid(format!("usage: {}", form))
}

const HELP: &str = "\
Commands:
  /agents        list unlocked agents
  /agent ID      switch agent
  /new           start a new chat
  /sessions      list chats for this agent
  /switch N      open chat N
  /delete N      delete chat N
  /unlock CODE   enter another access code
  /test          toggle the test webhook
  /quit          leave
Anything else is sent to the current agent.";

// ============================================================================
// Access codes
// ============================================================================

/// Check a code locally, or through the code-checker relay when `remote`.
pub async fn unlock(
    chat: &mut ChatState,
    checker: &CodeCheckerClient,
    code: &str,
    remote: bool,
) -> bool {
    let now = Instant::now();
    if !remote {
        return matches!(chat.unlock(code, now), GateOutcome::Granted(_));
    }

    match checker.check(code, chat.test_mode()).await {
        Ok(verdict) if verdict.valid => {
            chat.apply_grant(&verdict.allowed_agents);
            true
        }
        Ok(_) => {
            chat.gate_mut().deny(now);
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "Code checker unreachable");
            chat.gate_mut().deny(now);
            false
        }
    }
}

// ============================================================================
// Chat loop
// ============================================================================

pub struct ChatOptions {
    pub agent: Option<String>,
    pub remote_codes: bool,
}

type Delivered = (Dispatch, GateResult<Value>);

fn spawn_delivery(
    chat: &ChatState,
    inflight: &mut JoinSet<Delivered>,
    transport: Arc<dyn AgentTransport>,
    dispatch: Dispatch,
) {
    println!("{}", pending_line(chat, &dispatch));
    tracing::debug!(
        transport = transport.name(),
        agent = %dispatch.agent_id,
        "Delivering message"
    );
    inflight.spawn(async move {
        let outcome = transport.deliver(&dispatch).await;
        (dispatch, outcome)
    });
}

fn prompt(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

fn agent_name(chat: &ChatState, id: &str) -> String {
    chat.agents()
        .iter()
        .find(|a| a.id == id)
        .map(|a| a.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn print_banner(chat: &ChatState) {
    if let Some(agent) = chat.selected_agent() {
        println!();
        println!("{} · {} · {}", agent.name, agent.description, agent.domain);
        if chat.test_mode() {
            println!("(test webhook)");
        }
        println!("Send a message to start a conversation, /help for commands.");
    }
}

/// Shown while a reply is outstanding.
fn pending_line(chat: &ChatState, dispatch: &Dispatch) -> String {
    format!("[{}] …", agent_name(chat, &dispatch.agent_id))
}

fn print_completion(chat: &ChatState, dispatch: &Dispatch, completion: &Completion) {
    println!("\n[{}] {}", agent_name(chat, &dispatch.agent_id), completion.reply.content);
}

fn print_sessions(chat: &ChatState) {
    let active = chat.active_session().map(|s| s.id);
    if chat.sessions().is_empty() {
        println!("No chats yet.");
    }
    // Most recent first, numbered as shown.
    for (i, s) in chat.sessions().iter().rev().enumerate() {
        let marker = if Some(s.id) == active { "*" } else { " " };
        println!(
            "{} {:>2}. {} ({} messages, {})",
            marker,
            i + 1,
            s.title,
            s.messages.len(),
            s.created_at.format("%H:%M:%S")
        );
    }
}

fn session_at(chat: &ChatState, n: usize) -> Option<Uuid> {
    chat.sessions().iter().rev().nth(n - 1).map(|s| s.id)
}

fn print_history(chat: &ChatState) {
    let Some(session) = chat.active_session() else {
        return;
    };
    let name = chat
        .selected_agent()
        .map(|a| a.name.clone())
        .unwrap_or_default();
    for m in &session.messages {
        match m.role {
            Role::User => println!("you> {}", m.content),
            Role::Agent => println!("[{}] {}", name, m.content),
        }
    }
}

/// Handle one input line. Returns a dispatch to deliver, if any. Errors are
/// shown to the user and never end the session.
async fn handle_input(
    chat: &mut ChatState,
    checker: &CodeCheckerClient,
    input: Input,
    remote_codes: bool,
) -> GateResult<Option<Dispatch>> {
    match input {
        Input::Text(text) => match chat.submit(&text)? {
            Submission::Dispatched(d) => return Ok(Some(d)),
            Submission::Queued { displaced } => {
                match displaced {
                    Some(old) => println!("(still waiting; replaced queued message: {})", old),
                    None => println!("(still waiting; message queued)"),
                }
            }
            Submission::Ignored => {}
        },
        Input::Help => println!("{}", HELP),
        Input::Agents => {
            let current = chat.selected_agent().map(|a| a.id.clone());
            for a in chat.visible_agents() {
                let marker = if Some(&a.id) == current.as_ref() { "*" } else { " " };
                println!("{} {:<14} {} · {}", marker, a.id, a.name, a.description);
            }
        }
        Input::Agent(id) => match chat.select_agent(&id) {
            Ok(()) => {
                print_banner(chat);
                print_history(chat);
            }
            Err(e) => println!("{}", e),
        },
        Input::New => {
            chat.new_session()?;
            println!("Started a new chat.");
        }
        Input::Sessions => print_sessions(chat),
        Input::Switch(n) => match session_at(chat, n) {
            Some(id) => {
                chat.select_session(id)?;
                print_history(chat);
            }
            None => println!("No chat #{}", n),
        },
        Input::Delete(n) => match session_at(chat, n) {
            Some(id) => {
                chat.delete_session(id)?;
                println!("Deleted chat #{}", n);
            }
            None => println!("No chat #{}", n),
        },
        Input::Unlock(code) => {
            let before = chat.visible_agents().len();
            if unlock(chat, checker, &code, remote_codes).await {
                let after = chat.visible_agents().len();
                println!("Unlocked {} more agent(s).", after.saturating_sub(before));
            } else {
                println!("Invalid code.");
            }
        }
        Input::Test => {
            let on = chat.toggle_test_mode();
            println!("Test webhook {}", if on { "on" } else { "off" });
        }
        Input::Invalid(msg) => println!("{}", msg),
        Input::Quit => {}
    }
    Ok(None)
}

pub async fn run(
    mut chat: ChatState,
    transport: Arc<dyn AgentTransport>,
    checker: CodeCheckerClient,
    options: ChatOptions,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while !chat.gate().unlocked() {
        prompt("Access code: ");
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        if !unlock(&mut chat, &checker, line.trim(), options.remote_codes).await {
            println!("Invalid code. Try again.");
        }
    }

    if let Some(id) = &options.agent {
        if let Err(e) = chat.select_agent(id) {
            println!("{}", e);
        }
    }
    print_banner(&chat);

    let mut inflight: JoinSet<Delivered> = JoinSet::new();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = parse_input(&line);
                if input == Input::Quit {
                    break;
                }
                match handle_input(&mut chat, &checker, input, options.remote_codes).await {
                    Ok(Some(dispatch)) => spawn_delivery(&chat, &mut inflight, transport.clone(), dispatch),
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
            Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                let (dispatch, outcome) = joined?;
                let completion = chat.finish(&dispatch, outcome)?;
                print_completion(&chat, &dispatch, &completion);
                if let Some(next) = completion.next {
                    spawn_delivery(&chat, &mut inflight, transport.clone(), next);
                }
            }
        }
    }

    if !inflight.is_empty() {
        tracing::warn!(pending = inflight.len(), "Leaving with replies still pending");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_submitted() {
        assert_eq!(parse_input("  hello there "), Input::Text("hello there".to_string()));
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse_input("/new"), Input::New);
        assert_eq!(parse_input("/agent chiroli"), Input::Agent("chiroli".to_string()));
        assert_eq!(parse_input("/switch 2"), Input::Switch(2));
        assert_eq!(parse_input("/delete 1"), Input::Delete(1));
        assert_eq!(parse_input("/unlock 1234"), Input::Unlock("1234".to_string()));
        assert_eq!(parse_input("/exit"), Input::Quit);
    }

    #[test]
    fn test_pending_line_names_agent() {
        let mut chat = ChatState::new(
            gatechat_core::models::builtin_agents(),
            vec![gatechat_core::AccessCode {
                code: "open".to_string(),
                allowed_agents: gatechat_core::AccessGrant::All,
            }],
            10,
        );
        chat.unlock("open", Instant::now());
        let dispatch = match chat.submit("hello").unwrap() {
            Submission::Dispatched(d) => d,
            other => panic!("unexpected {:?}", other),
        };
        let name = chat.selected_agent().unwrap().name.clone();
        assert_eq!(pending_line(&chat, &dispatch), format!("[{}] …", name));
        assert!(chat.is_loading());
    }

    #[test]
    fn test_bad_commands() {
        assert!(matches!(parse_input("/switch zero"), Input::Invalid(_)));
        assert!(matches!(parse_input("/delete 0"), Input::Invalid(_)));
        assert!(matches!(parse_input("/agent"), Input::Invalid(_)));
        assert!(matches!(parse_input("/frobnicate"), Input::Invalid(_)));
    }
}
