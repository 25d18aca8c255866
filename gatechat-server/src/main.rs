use clap::Parser;
use gatechat_core::GateConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "GATECHAT_CONFIG", default_value = "gatechat.toml")]
    config: String,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match GateConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if args.check {
        println!("✅ Config loaded from {}", args.config);
        println!("✅ {} agent(s), {} access code(s)", config.agents.len(), config.access_codes.len());
        for prefix in &config.proxy.allowed_prefixes {
            println!("✅ allow-listed: {}", prefix);
        }
        let unlisted: Vec<_> = config
            .agents
            .iter()
            .filter(|a| !config.proxy.is_allowed(&a.webhook))
            .map(|a| a.id.as_str())
            .collect();
        if !unlisted.is_empty() {
            println!("❌ agents outside the allow-list: {}", unlisted.join(", "));
            std::process::exit(1);
        }
        return Ok(());
    }

    if !config.http.enabled {
        tracing::warn!("HTTP relay disabled in config; nothing to serve");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    gatechat_server::http::start_http_server(config, tx.subscribe()).await?;

    Ok(())
}
