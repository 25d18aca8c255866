//! gatechat: terminal client for the Gatechat relay
//!
//! Unlock agents with an access code, then chat with them through the
//! `gatechat-server` proxy. History is kept in memory for the lifetime of
//! the process only.
//!
//! # Subcommands
//! - `chat [--agent ID] [--test-mode] [--remote-codes]`: interactive chat
//! - `send --code CODE [--agent ID] [--test-mode] <text>`: one message, print the reply
//! - `agents`: list configured agents
//! - `check-code <code> [--test-mode]`: ask the code-checker relay
//! - `status`: show relay health

mod repl;

use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use gatechat_core::{
    ChatState, CodeCheckerClient, GateConfig, GateError, GateOutcome, ProxyTransport, WebhookClient,
};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "gatechat",
    version,
    about = "Passcode-gated chat with remote agent webhooks"
)]
struct Cli {
    /// Config file (agents, access codes, client defaults)
    #[arg(short, long, env = "GATECHAT_CONFIG", default_value = "gatechat.toml")]
    config: String,

    /// Relay server URL (overrides [client].server_url)
    #[arg(long, env = "GATECHAT_SERVER_URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive chat
    Chat {
        /// Agent to open first
        #[arg(long)]
        agent: Option<String>,

        /// Start with the test webhooks selected
        #[arg(long)]
        test_mode: bool,

        /// Verify access codes through the code-checker relay
        #[arg(long)]
        remote_codes: bool,
    },

    /// Send a single message and print the reply
    Send {
        /// Access code
        #[arg(long, env = "GATECHAT_CODE")]
        code: String,

        #[arg(long)]
        agent: Option<String>,

        #[arg(long)]
        test_mode: bool,

        /// Message text
        text: Vec<String>,
    },

    /// List configured agents
    Agents,

    /// Ask the code-checker relay about a code
    CheckCode {
        code: String,

        #[arg(long)]
        test_mode: bool,
    },

    /// Show relay server status
    Status,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let config = GateConfig::load(&cli.config)?;
    let server = cli
        .server
        .clone()
        .unwrap_or_else(|| config.client.server_url.clone());
    let client = WebhookClient::from_timeout_secs(config.http.request_timeout_seconds)?;

    match cli.command {
        Commands::Chat {
            agent,
            test_mode,
            remote_codes,
        } => {
            let mut chat = ChatState::from_config(&config);
            if test_mode {
                chat.toggle_test_mode();
            }
            let transport = Arc::new(ProxyTransport::new(client.clone(), &server));
            let checker = CodeCheckerClient::new(client, &server);
            repl::run(
                chat,
                transport,
                checker,
                repl::ChatOptions {
                    agent,
                    remote_codes,
                },
            )
            .await
        }
        Commands::Send {
            code,
            agent,
            test_mode,
            text,
        } => {
            let mut chat = ChatState::from_config(&config);
            if test_mode {
                chat.toggle_test_mode();
            }
            if chat.unlock(&code, Instant::now()) == GateOutcome::Denied {
                return Err(GateError::InvalidCode.into());
            }
            if let Some(id) = agent {
                chat.select_agent(&id)?;
            }
            let transport = ProxyTransport::new(client, &server);
            for completion in chat.send(&transport, &text.join(" ")).await? {
                println!("{}", completion.reply.content);
            }
            Ok(())
        }
        Commands::Agents => {
            for a in &config.agents {
                println!("{:<14} {:<16} {} ({})", a.id, a.name, a.description, a.domain);
            }
            Ok(())
        }
        Commands::CheckCode { code, test_mode } => {
            let checker = CodeCheckerClient::new(client, &server);
            let verdict = checker.check(&code, test_mode).await?;
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(())
        }
        Commands::Status => {
            let url = format!("{}/health", server.trim_end_matches('/'));
            match client.get_json(&url).await {
                Ok((status, body)) if status.is_success() => {
                    println!("✅ {} is up", server);
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    Ok(())
                }
                Ok((status, _)) => anyhow::bail!("❌ {} answered {}", server, status),
                Err(e) => anyhow::bail!("❌ {} unreachable: {}", server, e),
            }
        }
    }
}
