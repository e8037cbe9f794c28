//! Daemon entry point.
//!
//! ```bash
//! # Start the relay (foreground)
//! chatterd start
//!
//! # Start the relay (background/daemonized)
//! chatterd start -d
//!
//! # Stop the relay
//! chatterd stop
//!
//! # Check relay status
//! chatterd status
//!
//! # Start on a custom port, IPv4 only
//! chatterd start --port 6000 --family v4
//!
//! # Enable debug logging
//! RUST_LOG=chatterd=debug chatterd start
//! ```
//!
//! # Signal Handling
//!
//! SIGTERM/SIGINT trigger a graceful shutdown of the dispatcher loop.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatter_core::{AddrFamily, RelayConfig};

use crate::server::RelayServer;

/// Chatter daemon - bounded TCP text relay
#[derive(Parser, Debug)]
#[command(name = "chatterd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the relay server
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,

        /// TCP port to listen on (default 5900)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address family of the listener: v4 or v6
        #[arg(short, long)]
        family: Option<AddrFamily>,

        /// Maximum number of concurrent clients (default 5)
        #[arg(long)]
        max_clients: Option<usize>,

        /// Maximum message size in bytes per read (default 256)
        #[arg(long)]
        max_message: Option<usize>,

        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Stop the running relay server
    Stop,
    /// Show relay server status
    Status,
}

/// Directory holding the PID and log files.
fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("chatter")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("chatterd.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("chatterd.log")
}

fn read_pid() -> Option<u32> {
    let path = pid_file_path();
    let mut file = File::open(&path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let path = pid_file_path();
    let _ = fs::remove_file(path);
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        // Stale PID file
        remove_pid_file();
    }
    None
}

fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

/// CLI entry point for the `chatterd` binary.
pub fn run() -> Result<()> {
    let args = Args::parse();

    let command = args.command.unwrap_or(Command::Start {
        daemon: false,
        port: None,
        family: None,
        max_clients: None,
        max_message: None,
        config: None,
    });

    match command {
        Command::Start {
            daemon,
            port,
            family,
            max_clients,
            max_message,
            config,
        } => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Relay server is already running (PID {pid})");
                eprintln!("Use 'chatterd stop' to stop it first.");
                process::exit(1);
            }

            let config = load_config(config, port, family, max_clients, max_message)?;

            if daemon {
                daemonize()?;
            }

            write_pid()?;

            let result = run_server(config);

            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping relay server (PID {pid})...");
                stop_daemon(pid)?;

                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Relay server stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Relay server did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Relay server is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Relay server is running (PID {pid})");
                Ok(())
            } else {
                println!("Relay server is not running.");
                process::exit(1);
            }
        }
    }
}

/// Builds the effective configuration: file, then environment, then flags.
fn load_config(
    path: Option<PathBuf>,
    port: Option<u16>,
    family: Option<AddrFamily>,
    max_clients: Option<usize>,
    max_message: Option<usize>,
) -> Result<RelayConfig> {
    let mut config = match path {
        Some(path) => RelayConfig::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RelayConfig::default(),
    }
    .with_env_overrides();

    if let Some(port) = port {
        config.port = port;
    }
    if let Some(family) = family {
        config.family = family;
    }
    if let Some(max_clients) = max_clients {
        config.max_clients = max_clients;
    }
    if let Some(max_message) = max_message {
        config.max_message = max_message;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Forks to the background, redirecting both output streams into the
/// shared log file.
fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    fs::create_dir_all(state_dir()).context("Failed to create state directory")?;

    let log_path = log_file_path();
    let stdout = File::create(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
    let stderr = stdout
        .try_clone()
        .context("Failed to clone log file handle")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_server(config: RelayConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("chatterd=info".parse()?)
                .add_directive("chatter_core=info".parse()?)
                .add_directive("chatter_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Chatter daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let server = RelayServer::bind(config, cancel_token)?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Chatter daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_every_knob() {
        let config = load_config(
            None,
            Some(6000),
            Some(AddrFamily::V4),
            Some(10),
            Some(512),
        )
        .unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.family, AddrFamily::V4);
        assert_eq!(config.max_clients, 10);
        assert_eq!(config.max_message, 512);
    }

    #[test]
    fn test_absent_flags_keep_defaults() {
        let config = load_config(None, None, None, None, None).unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_invalid_flag_value_is_rejected() {
        assert!(load_config(None, None, None, Some(0), None).is_err());
        assert!(load_config(None, None, None, None, Some(0)).is_err());
    }
}
