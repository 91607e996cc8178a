//! Main entry point for the lobby bot
//!
//! Loads configuration, initializes logging, runs the bot until a shutdown
//! signal or a fatal gateway error, then shuts down gracefully.

use anyhow::Result;
use clap::Parser;
use lobby_bot::config::{validate_config, AppConfig};
use lobby_bot::service::AppState;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Discord bot for scheduling game lobbies
#[derive(Parser)]
#[command(
    name = "lobby-bot",
    version,
    about = "A Discord bot that schedules game lobbies and picks games",
    long_about = "Lobby Bot lets members announce game lobbies for a time of day, join them \
                 by reacting to the announcement, pings the roster when the lobby starts, \
                 retires lobbies whose players have left voice, and picks random games."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML, or JSON with {\"token\", \"channel_id\"})"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Health server port override
    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    /// Command prefix override
    #[arg(long, value_name = "PREFIX", help = "Override the command prefix")]
    prefix: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without connecting")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🎮 Lobby Bot");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Command prefix: {}", config.bot.command_prefix);
    match config.bot.standby_channel_id {
        Some(channel) => info!("   Standby channel: {}", channel),
        None => info!("   Standby channel: none"),
    }
    info!(
        "   Sweeps: activation every {}s, idle every {}s (timeout {}s)",
        config.scheduler.activation_interval_seconds,
        config.scheduler.idle_sweep_interval_seconds,
        config.scheduler.idle_timeout_seconds
    );
    if config.service.enable_health_server {
        info!("   Health port: {}", config.service.health_port);
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load configuration from a file or the environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(config_path) => AppConfig::from_file(config_path)?,
        None => AppConfig::from_env()?,
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(port) = args.health_port {
        config.service.health_port = port;
    }

    if let Some(prefix) = &args.prefix {
        config.bot.command_prefix = prefix.clone();
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);

    if args.dry_run {
        info!("Configuration validation successful");
        info!("Dry run completed - exiting without connecting");
        return Ok(());
    }

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Press Ctrl+C to shutdown gracefully...");

    let mut exit_code = 0;
    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        }
        result = app_state.gateway_closed() => {
            match result {
                Ok(()) => warn!("Gateway session ended, shutting down"),
                Err(e) => {
                    error!("Gateway failed: {}", e);
                    exit_code = 1;
                }
            }
        }
    }

    if let Err(e) = app_state.shutdown().await {
        warn!("Shutdown completed with errors: {}", e);
    }

    info!("🛑 Lobby bot stopped");
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
