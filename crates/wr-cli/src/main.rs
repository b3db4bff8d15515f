//! CLI entry point for watch-relay.
//!
//! This binary watches a directory tree, posts periodic digests of its changes
//! to Discord, and relays new artifacts through the caption handshake in the
//! moderation channel.
//!
//! # Usage
//!
//! ```bash
//! watch-relay [OPTIONS] <COMMAND>
//!
//! # Run the relay until Ctrl-C
//! watch-relay --config /etc/watch-relay/config.toml run
//!
//! # Validate the configuration and exit
//! watch-relay check-config
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wr_core::{Config, ConfigHandle, WatchConfig, DEFAULT_CONFIG_FILE, DEFAULT_LOG_FILE};
use wr_discord::{DiscordClient, Gateway};
use wr_relay::{run_inbound, Aggregator, FatalReceiver, RelayContext, RelayError};
use wr_watcher::{CompositeFilter, FileWatcher, IgnoreNamesFilter, IgnorePathsFilter};

/// Inbound messages buffered between the gateway and the dispatcher.
const INBOUND_CAPACITY: usize = 256;

/// How long the gateway gets to close its socket on shutdown.
const GATEWAY_CLOSE_GRACE: Duration = Duration::from_secs(5);

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Relays filesystem changes and captioned artifacts to Discord.
#[derive(Parser)]
#[command(name = "watch-relay", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, env = "WATCH_RELAY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: Utf8PathBuf,

    /// File that log output is appended to, in addition to stderr.
    #[arg(long, global = true, env = "WATCH_RELAY_LOG", default_value = DEFAULT_LOG_FILE)]
    log_file: Utf8PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Watch, digest and relay until interrupted.
    Run,

    /// Load and validate the configuration, then print a summary.
    CheckConfig,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// HTTP, websocket and notify internals are filtered to `warn` level.
///
/// Output goes to stderr and is appended to `log_file` without colors.
fn init_tracing(verbose: bool, no_color: bool, log_file: &Utf8Path) -> color_eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!(
            "{level},hyper=warn,hyper_util=warn,reqwest=warn,tungstenite=warn,tokio_tungstenite=warn,mio=warn,notify=warn"
        ))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .wrap_err_with(|| format!("failed to open log file {log_file}"))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        .with(filter)
        .init();

    Ok(())
}

fn validate_dir(path: &Utf8Path, label: &str) -> color_eyre::Result<()> {
    if path.as_str().is_empty() {
        return Err(eyre!("{label} path is required but missing."));
    }

    if !path.exists() {
        return Err(eyre!("{label} path does not exist: {path}"));
    }

    if !path.is_dir() {
        return Err(eyre!("{label} path is not a directory: {path}"));
    }

    Ok(())
}

/// Loads the configuration and checks that both watched directories exist.
fn load_config(path: &Utf8Path) -> color_eyre::Result<ConfigHandle> {
    let handle = ConfigHandle::load(path)
        .wrap_err_with(|| format!("failed to load configuration from {path}"))?;
    let config = handle.snapshot();
    validate_dir(&config.watch.dir, "watch.dir")?;
    validate_dir(&config.watch.artifacts_dir, "watch.artifacts_dir")?;
    Ok(handle)
}

/// Builds the watcher filter: our own config and log files, matched by
/// canonical path, plus the names listed in `watch.ignore` never produce
/// events. Same-named files elsewhere in the tree are still reported.
fn watch_filter(config_path: &Utf8Path, log_file: &Utf8Path, watch: &WatchConfig) -> CompositeFilter {
    let own_files = [config_path, log_file]
        .into_iter()
        .filter_map(|path| path.canonicalize_utf8().ok());

    CompositeFilter::new()
        .and(IgnorePathsFilter::new(own_files))
        .and(IgnoreNamesFilter::new(watch.ignore.iter().cloned()))
}

// =============================================================================
// COMMAND HANDLERS
// =============================================================================

/// Runs the relay until a signal arrives or a fatal error is reported.
///
/// # Errors
///
/// Returns an error if startup fails or a fatal relay error occurs.
async fn run_relay(cli: &Cli) -> color_eyre::Result<()> {
    let handle = Arc::new(load_config(&cli.config)?);
    let config = handle.snapshot();

    let client = DiscordClient::new(&config.discord).wrap_err("failed to build Discord client")?;
    let (ctx, mut fatal_rx) = RelayContext::new(Arc::new(client), Arc::clone(&handle));

    let artifacts_root = config
        .watch
        .artifacts_dir
        .canonicalize_utf8()
        .wrap_err_with(|| format!("failed to resolve {}", config.watch.artifacts_dir))?;
    let roots = [config.watch.dir.clone(), config.watch.artifacts_dir.clone()];
    let filter = watch_filter(&cli.config, &cli.log_file, &config.watch);
    let mut watcher = FileWatcher::new(&roots, &config.watch, filter)
        .await
        .wrap_err("failed to start file watcher")?;
    info!(
        roots = ?watcher.roots(),
        artifacts = %artifacts_root,
        subscribers = config.discord.subscriber_channels.len(),
        "Starting relay"
    );

    let aggregator = Arc::new(Aggregator::new(Arc::clone(&ctx), artifacts_root));

    // The collector owns the watcher; dropping it stops the watcher thread.
    let collector = tokio::spawn({
        let aggregator = Arc::clone(&aggregator);
        async move { aggregator.run_collector(watcher.events()).await }
    });
    let flusher = tokio::spawn(Arc::clone(&aggregator).run_flush_loop());

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let inbound = tokio::spawn(run_inbound(inbound_rx, Arc::clone(&ctx)));

    let shutdown = CancellationToken::new();
    let gateway = tokio::spawn({
        let gateway = Gateway::new(&config.discord, inbound_tx);
        let shutdown = shutdown.clone();
        let ctx = Arc::clone(&ctx);
        async move {
            if let Err(err) = gateway.run(shutdown).await {
                ctx.alerter().report(RelayError::Inbound(err.into())).await;
            }
        }
    });

    let outcome = wait_for_stop(&mut fatal_rx).await;

    shutdown.cancel();
    collector.abort();
    flusher.abort();
    if tokio::time::timeout(GATEWAY_CLOSE_GRACE, gateway).await.is_err() {
        warn!("gateway did not close in time");
    }
    inbound.abort();

    let pending = ctx.registry().pending_count();
    if pending > 0 {
        info!(pending, "abandoning unanswered handshakes");
    }

    outcome
}

/// Waits for Ctrl-C, SIGTERM, or the first fatal error.
async fn wait_for_stop(fatal_rx: &mut FatalReceiver) -> color_eyre::Result<()> {
    tokio::select! {
        err = fatal_rx.recv() => fatal(err),
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
        result = terminate_signal() => {
            result?;
            info!("Received SIGTERM, shutting down");
            Ok(())
        }
    }
}

// Handle SIGTERM for graceful shutdown on Unix
#[cfg(unix)]
async fn terminate_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate_signal() -> std::io::Result<()> {
    std::future::pending().await
}

fn fatal(err: Option<RelayError>) -> color_eyre::Result<()> {
    match err {
        Some(err) => Err(color_eyre::Report::new(err).wrap_err("watch-relay stopped")),
        None => Err(eyre!("fatal error channel closed unexpectedly")),
    }
}

/// Validates the configuration and prints what the relay would do.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
fn check_config(path: &Utf8Path) -> color_eyre::Result<()> {
    let handle = load_config(path)?;
    let config = handle.snapshot();
    print_config_summary(path, &config)?;
    Ok(())
}

// =============================================================================
// OUTPUT FUNCTIONS
// =============================================================================

/// Prints a summary of the loaded configuration.
fn print_config_summary(path: &Utf8Path, config: &Config) -> std::io::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    let subscribers = config
        .discord
        .subscriber_channels
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let timeout = config
        .relay
        .caption_timeout_secs
        .map_or_else(|| "none".to_owned(), |secs| format!("{secs}s"));

    writeln!(handle, "Configuration OK: {path}")?;
    writeln!(handle)?;
    writeln!(handle, "  Watched dir:         {}", config.watch.dir)?;
    writeln!(handle, "  Artifacts dir:       {}", config.watch.artifacts_dir)?;
    writeln!(handle, "  Moderation channel:  {}", config.discord.moderation_channel)?;
    writeln!(handle, "  Subscriber channels: {subscribers}")?;
    writeln!(handle, "  Principal:           {}", config.discord.principal)?;
    writeln!(handle, "  Command prefix:      {}", config.discord.command_prefix)?;
    writeln!(
        handle,
        "  Flush interval:      {}s",
        config.digest.flush_interval_secs
    )?;
    writeln!(handle, "  Caption timeout:     {timeout}")?;
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color, &cli.log_file)?;

    // 4. Route to appropriate command
    match &cli.command {
        Commands::Run => run_relay(&cli).await,
        Commands::CheckConfig => check_config(&cli.config),
    }
}
