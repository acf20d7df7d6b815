//! # Telemetry Ingest
//!
//! Receive drone telemetry frames over TCP and persist them to a CSV log.
//!
//! Two subcommands are provided:
//! - `listen`: run the ingestion listener (one frame per connection)
//! - `probe`: check that a host/port is reachable, retrying on failure

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use telemetry_ingest::config::{Config, LoggingConfig};
use telemetry_ingest::listener::ListenerService;
use telemetry_ingest::probe::{ProbeMode, ReachabilityProbe};
use telemetry_ingest::telemetry::log::TelemetryLog;

/// File name prefix of the rolling diagnostic log
const DIAGNOSTIC_LOG_PREFIX: &str = "telemetry-ingest.log";

/// Telemetry ingestion listener and reachability probe.
#[derive(Parser, Debug)]
#[command(name = "telemetry-ingest", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults are used when omitted).
    #[arg(short, long, env = "TELEMETRY_CONFIG")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "TELEMETRY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Accept telemetry frames and append them to the CSV log.
    Listen(ListenArgs),

    /// Repeatedly try to connect to a host/port.
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// Local interface address to bind (IP literal, 0.0.0.0 for all).
    #[arg(long, env = "TELEMETRY_HOST")]
    host: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "TELEMETRY_PORT")]
    port: Option<u16>,

    /// Maximum number of pending connections.
    #[arg(long)]
    backlog: Option<u32>,

    /// CSV file receiving one row per frame.
    #[arg(long, env = "TELEMETRY_LOG_PATH")]
    log_path: Option<String>,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Target host name or address.
    host: Option<String>,

    /// Target TCP port.
    port: Option<u16>,

    /// Wait between attempts, in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after the first successful connection.
    #[arg(long)]
    once: bool,
}

/// Main entry point for Telemetry Ingest
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse command line and load configuration
///    - Set up logging with tracing subscriber
///
/// 2. **Listen**
///    - Initialize the CSV log (header policy from config)
///    - Bind and listen; failures here are fatal
///    - Accept loop until Ctrl+C, then finish the in-flight frame and exit
///
/// 3. **Probe**
///    - Connect to the target, retrying every interval until Ctrl+C
///      (or the first success with `--once`)
///
/// # Errors
///
/// Returns error (non-zero exit) if configuration is invalid, the log cannot
/// be created, or the listener cannot bind/listen.
///
/// # Examples
///
/// ```bash
/// telemetry-ingest listen --host 192.168.70.109 --port 8080
/// telemetry-ingest probe 192.168.70.109 8080 --once
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    apply_overrides(&mut config, &cli.command);
    config.validate().context("invalid configuration")?;

    let _log_guard = init_logging(&config.logging)?;

    info!("Telemetry Ingest v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    spawn_ctrl_c_handler(shutdown.clone());

    match cli.command {
        Commands::Listen(_) => run_listener(config, shutdown).await,
        Commands::Probe(_) => {
            let probe = ReachabilityProbe::from_config(&config.probe);
            probe.run(shutdown).await;
            Ok(())
        }
    }
}

/// Copy command-line values over the loaded configuration
fn apply_overrides(config: &mut Config, command: &Commands) {
    match command {
        Commands::Listen(args) => {
            if let Some(host) = &args.host {
                config.listener.host = host.clone();
            }
            if let Some(port) = args.port {
                config.listener.port = port;
            }
            if let Some(backlog) = args.backlog {
                config.listener.backlog = backlog;
            }
            if let Some(path) = &args.log_path {
                config.log.path = path.clone();
            }
        }
        Commands::Probe(args) => {
            if let Some(host) = &args.host {
                config.probe.host = host.clone();
            }
            if let Some(port) = args.port {
                config.probe.port = port;
            }
            if let Some(interval) = args.interval_ms {
                config.probe.retry_interval_ms = interval;
            }
            if args.once {
                config.probe.mode = ProbeMode::ExitOnSuccess;
            }
        }
    }
}

/// Install the tracing subscriber
///
/// Stdout always; a daily rolling file as well when `logging.dir` is set.
/// The returned guard must be held until exit so buffered lines are flushed.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("invalid log filter")?;

    let stdout_layer = tracing_subscriber::fmt::layer();

    if logging.dir.is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&logging.dir, DIAGNOSTIC_LOG_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(Some(guard))
}

/// Cancel `shutdown` on Ctrl+C
fn spawn_ctrl_c_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });
}

/// Initialize the log, bind, listen and serve until shutdown
async fn run_listener(config: Config, shutdown: CancellationToken) -> Result<()> {
    let log = TelemetryLog::initialize(&config.log.path, config.log.header_policy)
        .await
        .with_context(|| format!("failed to initialize telemetry log at {}", config.log.path))?;

    let mut service = ListenerService::new(config.listener.clone(), Arc::new(log));
    if let Err(e) = service.start() {
        error!("{}", e);
        return Err(e.into());
    }

    let stats = service.run(shutdown).await?;
    info!("Total frames persisted: {}", stats.persisted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_listen() {
        let cli = Cli::try_parse_from([
            "telemetry-ingest", "listen", "--host", "127.0.0.1", "--port", "9000",
        ])
        .unwrap();

        let mut config = Config::default();
        apply_overrides(&mut config, &cli.command);

        assert_eq!(config.listener.host, "127.0.0.1");
        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.listener.backlog, 5);
    }

    #[test]
    fn test_cli_parses_probe_once() {
        let cli = Cli::try_parse_from([
            "telemetry-ingest", "probe", "192.168.70.109", "8080", "--once", "--interval-ms", "250",
        ])
        .unwrap();

        let mut config = Config::default();
        apply_overrides(&mut config, &cli.command);

        assert_eq!(config.probe.host, "192.168.70.109");
        assert_eq!(config.probe.port, 8080);
        assert_eq!(config.probe.retry_interval_ms, 250);
        assert_eq!(config.probe.mode, ProbeMode::ExitOnSuccess);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["telemetry-ingest"]).is_err());
    }
}
