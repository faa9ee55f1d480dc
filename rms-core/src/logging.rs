//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output goes to stderr; a daily-rotated file receives either
//! human-readable or JSON records depending on configuration.

use std::path::Path;

use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;
use crate::constants::LOG_FILE_NAME;
use crate::error::{RmsError, RmsResult};

/// Guard that keeps the non-blocking log writer alive.
/// Drop this to flush and close the log file.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// `config.level` accepts anything `EnvFilter` understands ("debug",
/// "rms_socket=trace,info", ...); invalid filters fall back to "info".
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> RmsResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let file_layer = if config.json_output {
        fmt::layer()
            .with_writer(non_blocking)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter(&config.level))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| RmsError::Internal(format!("logging already initialized: {e}")))?;

    tracing::info!(
        "logging initialized at level={}, dir={}",
        config.level,
        log_dir.display()
    );

    Ok(LogGuard { _guard: guard })
}

/// Initialize a minimal console-only logger for tests or one-shot commands.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).compact())
        .try_init();
}
