//! Client entry point.
//!
//! ```bash
//! # Connect to a relay on localhost:5900
//! chatter
//!
//! # Connect to a remote relay on a custom port
//! chatter chat.example.net --port 6000
//!
//! # Enable debug logging (goes to stderr, chat stays on stdout)
//! RUST_LOG=chatter_cli=debug chatter
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatter_core::RelayConfig;

use crate::client::{run_session, ClientConfig};

/// Chatter - interactive terminal client for the relay
#[derive(Parser, Debug)]
#[command(name = "chatter", version, about)]
struct Args {
    /// Server host name or address
    #[arg(default_value = "localhost")]
    host: String,

    /// Server TCP port (default 5900)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a TOML config file (shared with chatterd)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// CLI entry point for the `chatter` binary.
pub fn run() -> Result<()> {
    let args = Args::parse();

    let relay_config = match &args.config {
        Some(path) => RelayConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RelayConfig::default(),
    }
    .with_env_overrides();

    let config = ClientConfig {
        host: args.host,
        port: args.port.unwrap_or(relay_config.port),
        max_message: relay_config.max_message,
    };

    run_client(config)
}

#[tokio::main]
async fn run_client(config: ClientConfig) -> Result<()> {
    // Logs go to stderr so relayed text on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    run_session(&config).await?;
    Ok(())
}
