//! RMS CLI - command-line client for the restaurant realtime channel.
//!
//! Wires a realtime channel from configuration and exposes it from the
//! terminal. Useful for watching live order and table traffic, pushing a
//! single update by hand, and smoke-testing a deployment's push endpoint.

mod commands;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;

use rms_core::config::AppConfig;
use rms_core::error::RmsResult;
use rms_core::logging;
use rms_core::platform::Platform;

/// RMS realtime - live restaurant updates from the terminal.
#[derive(Parser)]
#[command(
    name = "rms",
    version,
    about = "Restaurant realtime channel CLI",
    long_about = "A command-line client for the restaurant management realtime channel.\n\
                   Subscribe to order, table and reservation updates or publish them by hand."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Bearer token (overrides RMS_TOKEN and the saved session).
    #[arg(short, long, global = true)]
    token: Option<String>,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to topics and print every update until Ctrl-C.
    Listen {
        /// Topics to subscribe to (default: all known topics).
        topics: Vec<String>,
    },
    /// Publish one message on a topic.
    Send {
        /// Topic name, e.g. order_status_update.
        topic: String,
        /// JSON payload.
        payload: String,
        /// Seconds to wait for the connection before giving up.
        #[arg(long, default_value = "10")]
        wait: u64,
    },
    /// Run the connection smoke test.
    Probe {
        /// Seconds to keep listening after the test message is sent.
        #[arg(long, default_value = "5")]
        window: u64,
    },
    /// Show the resolved endpoint, session and reconnect policy.
    Status,
    /// Forget the saved session token.
    Logout,
}

fn load_config(path: Option<&str>) -> RmsResult<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::load_from_file(Path::new(path))?,
        None => AppConfig::load_default()?,
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> RmsResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = load_config(cli.config.as_deref())?;
    if cli.verbose {
        config.logging.level = "debug".into();
    }

    // Initialize logging
    let log_dir = config
        .effective_log_dir()
        .unwrap_or_else(|_| PathBuf::from("logs"));
    let _guard = logging::init_logging(&config.logging, &log_dir)?;

    info!(
        "RMS realtime CLI v{} on {}",
        rms_core::constants::APP_VERSION,
        Platform::current()
    );

    // Dispatch to command handlers
    let result = match cli.command {
        Commands::Listen { topics } => {
            commands::listen::run(&config, cli.token, topics, cli.format).await
        }
        Commands::Send {
            topic,
            payload,
            wait,
        } => commands::send::run(&config, cli.token, topic, payload, wait).await,
        Commands::Probe { window } => commands::probe::run(&config, cli.token, window).await,
        Commands::Status => commands::status::run(&config, cli.token, cli.format).await,
        Commands::Logout => commands::status::logout(&config),
    };

    if let Err(e) = &result {
        if e.is_transient() {
            eprintln!("hint: this looks temporary; check the backend and try again");
        }
    }
    result
}
