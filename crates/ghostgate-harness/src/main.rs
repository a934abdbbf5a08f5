//! Ghostgate console.
//!
//! Runs a gateway against a small in-memory backend and drives it from the
//! terminal. Each input line is `<target> <text>`; protocol lines for the
//! client are printed as they arrive. No syntax highlighter is installed, so
//! fenced code is printed unhighlighted.
//!
//! # Usage
//!
//! ```bash
//! ghostgate-console --config ghostgate.toml
//!
//! # then type
//! memory login alice@example.org
//! ghostgate scrollback #general|c1 10
//! #general|c1 hello everyone
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use ghostgate_bridge::Gateway;
use ghostgate_core::GatewayConfig;
use ghostgate_harness::{MemoryConnector, MemoryWorld};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Ghostgate console driver
#[derive(Parser, Debug)]
#[command(name = "ghostgate-console")]
#[command(about = "Drive a ghostgate gateway from the terminal")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Nick to connect with before login
    #[arg(short, long, default_value = "guest")]
    nick: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &args.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };

    let gateway = Gateway::new(config, Arc::new(MemoryConnector::new(MemoryWorld::sample())), None)?;
    if gateway.settings().syntax.is_some() {
        tracing::warn!("syntaxhighlighting is set but the console has no highlighter");
    }
    let (session, mut outbox) = gateway.open_session(&args.nick);
    tracing::info!(nick = %args.nick, "console session opened");

    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = outbox.recv().await {
            let line = format!("{message}\n");
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (target, text) = line.split_once(' ').unwrap_or((line, ""));
        if let Err(err) = session.handle_privmsg(target, text).await {
            tracing::warn!(to = target, error = %err, "message not delivered");
        }
    }

    session.close().await;
    drop(session);
    drop(gateway);
    let _ = tokio::time::timeout(Duration::from_millis(200), printer).await;

    Ok(())
}
