//! Sonar Binary Entry Point
//!
//! `sonar serve` runs the HTTP API over one session; `sonar watch` probes a
//! single target in the foreground and streams the log to stdout.
//! Core functionality is provided by the `sonar` library crate.

use clap::{Args, Parser, Subcommand};
use sonar::{
    config::{AppConfig, HttpMethod, ProbeMode, SessionConfig, parse_duration},
    log_buffer::{LogBuffer, LogEntry},
    probe::ProbeSet,
    server::{AppState, create_router},
    session::{EngineState, Session},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sonar - Reachability and Latency Monitor
#[derive(Parser, Debug)]
#[command(name = "sonar", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        default_value = "configs/config.yaml",
        env = "SONAR_CONFIG"
    )]
    config: String,

    /// Server bind address (overrides config file)
    #[arg(long, global = true, env = "SONAR_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, global = true, env = "SONAR_SERVER_PORT")]
    server_port: Option<u16>,

    /// Directory for exported log files (overrides config file)
    #[arg(long, global = true, env = "SONAR_EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Probe one target in the foreground
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// URL (http mode) or label (simulate mode)
    #[arg(long)]
    target: String,

    #[arg(long, default_value = "http")]
    mode: ProbeMode,

    #[arg(long, default_value = "HEAD")]
    method: HttpMethod,

    /// Delay between probes
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    interval: Duration,

    /// Per-probe deadline
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    timeout: Duration,

    /// Stop after this many results
    #[arg(long)]
    count: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file, falling back to defaults
    let mut config = AppConfig::load_or_default(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(bind) = cli.server_bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.server_port {
        config.server.port = port;
    }
    if let Some(dir) = cli.export_dir {
        config.log.export_dir = dir;
    }
    config.validate()?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Sonar - Reachability and Latency Monitor");
    tracing::debug!("Configuration loaded from: {}", cli.config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Watch(args) => watch(config, args).await,
    }
}

/// Run the HTTP API until a shutdown signal arrives.
async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let logs = Arc::new(LogBuffer::new(config.log.capacity));
    let probes = ProbeSet::from_config(&config)?;
    let session = Arc::new(Session::new(probes, Arc::clone(&logs)));

    if let Some(initial) = config.session.clone() {
        tracing::info!(
            "Auto-starting {} session to {}",
            initial.mode,
            initial.target
        );
        session.start(initial)?;
    }

    let app = create_router(AppState {
        session: Arc::clone(&session),
    });

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    tracing::info!("Web server listening on: http://{}", addr);
    tracing::info!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down session...");
    if session.state() == EngineState::Running
        && let Err(e) = session.stop()
    {
        tracing::warn!("Failed to stop session: {}", e);
    }
    session.dispose().await;
    export_logs(&logs, &config);

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Probe one target, printing each log line, until interrupted or `count`
/// results have been seen.
async fn watch(config: AppConfig, args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let logs = Arc::new(LogBuffer::new(config.log.capacity));
    let probes = ProbeSet::from_config(&config)?;
    let session = Session::new(probes, Arc::clone(&logs));

    let session_config = SessionConfig::new(args.target, args.mode)
        .with_method(args.method)
        .with_interval_ms(as_millis(args.interval))
        .with_timeout_ms(as_millis(args.timeout));
    let result_prefix = format!("{} ", args.mode.label());

    let mut live = logs.subscribe();
    session.start(session_config)?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut results = 0u64;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            entry = live.recv() => match entry {
                Ok(entry) => {
                    println!("{entry}");
                    if is_result(&entry, &result_prefix) {
                        results += 1;
                        if args.count.is_some_and(|count| results >= count) {
                            tracing::debug!(results, "Result count reached");
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Output fell behind; entries skipped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.stop()?;
    session.dispose().await;
    while let Ok(entry) = live.try_recv() {
        println!("{entry}");
    }

    export_logs(&logs, &config);
    Ok(())
}

fn is_result(entry: &LogEntry, prefix: &str) -> bool {
    entry.message.starts_with(prefix)
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Write the buffer to the export directory; failures are logged only.
fn export_logs(logs: &LogBuffer, config: &AppConfig) {
    if logs.is_empty() {
        tracing::debug!("Log buffer empty, nothing to export");
        return;
    }
    match logs.write_export(&config.log.export_dir, chrono::Utc::now()) {
        Ok(path) => tracing::info!("Logs written to: {}", path.display()),
        Err(e) => tracing::error!("Failed to export logs: {}", e),
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
