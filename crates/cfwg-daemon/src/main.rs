//! `cfwg` daemon
//!
//! Keeps a WireGuard tunnel created in the router's management UI supplied
//! with fresh credentials from the identity service.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use cfwg_core::Config;
use cfwg_core::config::load_config;
use cfwg_core::tracing_init::{default_filter, init_tracing};
use cfwg_daemon::identity::IdentityClient;
use cfwg_daemon::reconcile::{ReconcilePolicy, Reconciler};
use cfwg_daemon::service::{ServiceController, looks_like_udm};
use cfwg_daemon::setup::{self, SetupOutcome};
use cfwg_daemon::status;
use cfwg_daemon::wireguard::{TunnelConfigWriter, inspect_file};

#[derive(Parser, Debug)]
#[command(name = "cfwg")]
#[command(version, about = "Keeps a UI-managed WireGuard tunnel authenticated")]
struct Cli {
    /// Configuration file (default: search ./config.toml, /etc/cfwg-zt, ~/.cfwg-zt)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true, env = "CFWG_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reconciliation daemon
    Start,
    /// Report tunnel and device status (exit code 0 only when connected)
    Status,
    /// Write a commented default configuration file
    Setup {
        /// Overwrite an existing file without asking
        #[arg(long)]
        yes: bool,
    },
    /// Build a configuration file interactively
    ConfigWizard {
        /// Overwrite an existing file without asking
        #[arg(long)]
        yes: bool,
    },
    /// Print the version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start => {
            let config = load(cli.config.as_deref(), cli.debug, cli.log_json)?;
            run_daemon(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let config = load(cli.config.as_deref(), cli.debug, cli.log_json)?;
            run_status(&config).await
        }
        Command::Setup { yes } => {
            init_tracing(&default_filter(cli.debug), cli.log_json);
            let path = setup::target_path(cli.config.as_deref());
            report_setup(&setup::run_setup(&path, yes)?, false);
            Ok(ExitCode::SUCCESS)
        }
        Command::ConfigWizard { yes } => {
            init_tracing(&default_filter(cli.debug), cli.log_json);
            let path = setup::target_path(cli.config.as_deref());
            report_setup(&setup::run_wizard(&path, yes)?, true);
            Ok(ExitCode::SUCCESS)
        }
        Command::Version => {
            print_version();
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Load and validate configuration, then initialise tracing.
fn load(explicit: Option<&Path>, debug: bool, log_json: bool) -> anyhow::Result<Config> {
    let loaded = load_config(explicit).context("failed to load configuration")?;
    let mut config = loaded.config;
    config.debug |= debug;

    init_tracing(&default_filter(config.debug), log_json);
    match &loaded.source {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => warn!("No configuration file found, using defaults and environment"),
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval_minutes = config.refresh_interval_minutes,
        unit = %config.service.unit_name,
        tunnel = %config.tunnel.config_path.display(),
        "Starting cfwg daemon"
    );

    let identity =
        IdentityClient::new(&config.identity).context("failed to create identity client")?;
    let service = ServiceController::new(&config.service.unit_name);

    if !looks_like_udm() {
        warn!("This host does not look like a UniFi Dream Machine; some functionality may not work");
    }
    service
        .preflight(&config.tunnel.interface_name)
        .context("WireGuard is not available on this system")?;

    match inspect_file(&config.tunnel.config_path) {
        Ok(Some(report)) if !report.is_mergeable() => warn!(
            has_interface = report.has_interface,
            has_peer = report.has_peer,
            "Tunnel configuration is incomplete and will be replaced on the first cycle"
        ),
        Ok(Some(report)) if report.has_placeholder_keys => {
            info!("Tunnel configuration still holds placeholder keys; they will be replaced");
        }
        Ok(Some(_)) => info!("Tunnel configuration validated"),
        Ok(None) => warn!(
            path = %config.tunnel.config_path.display(),
            "Tunnel configuration not found; a fresh one will be rendered"
        ),
        Err(e) => warn!(error = %e, "Could not inspect tunnel configuration"),
    }

    let mut reconciler = Reconciler::new(
        identity,
        TunnelConfigWriter::from_config(&config),
        service,
        ReconcilePolicy::with_interval(config.refresh_interval()),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let loop_handle = tokio::spawn(async move { reconciler.run(shutdown_rx).await });

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    #[cfg(unix)]
    sd_notify::notify(true, &[sd_notify::NotifyState::Ready])?;

    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    let _ = shutdown_tx.send(true);
    loop_handle.await.context("reconciliation task panicked")?;

    info!("Daemon stopped");
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn run_status(config: &Config) -> anyhow::Result<ExitCode> {
    let mut identity =
        IdentityClient::new(&config.identity).context("failed to create identity client")?;
    let service = ServiceController::new(&config.service.unit_name);

    let report = status::check(&config.tunnel.config_path, &service, &mut identity).await;
    println!("{report}");
    Ok(ExitCode::from(report.exit_code()))
}

#[allow(clippy::print_stdout)]
fn report_setup(outcome: &SetupOutcome, show_next_steps: bool) {
    match outcome {
        SetupOutcome::Aborted => println!("Setup aborted"),
        SetupOutcome::Written {
            config,
            placeholder,
        } => {
            println!("Configuration file created at {}", config.display());
            if let Some(path) = placeholder {
                println!("Placeholder tunnel configuration written to {}", path.display());
            }
            if show_next_steps {
                println!();
                println!("{}", setup::next_steps(config));
            } else {
                println!("Edit this file to add your identity service credentials");
            }
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_version() {
    println!("cfwg {}", env!("CARGO_PKG_VERSION"));
}
