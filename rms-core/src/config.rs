//! Application configuration management.
//!
//! Holds the realtime endpoint, reconnect policy, session and logging
//! settings. Configuration is persisted as TOML on disk; the endpoint can be
//! overridden from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{RmsError, RmsResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Realtime push channel settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Session token settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Realtime push channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Base URL of the push endpoint; the token is appended as a query parameter.
    #[serde(default = "default_url")]
    pub url: String,

    /// Consecutive abnormal closes tolerated before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_reconnect_attempts: u32,

    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Multiplier applied to the delay per attempt.
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,

    /// Cap on the exponential part of the delay, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Exclusive upper bound of the random jitter, in milliseconds.
    #[serde(default = "default_max_jitter")]
    pub max_jitter_ms: u64,

    /// Timeout for the opening handshake in milliseconds (0 = none).
    #[serde(default)]
    pub connect_timeout_ms: u64,
}

/// Session token configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path of the persisted token file. If empty, uses the default location.
    #[serde(default)]
    pub token_file: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses the default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output in the log file.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_url() -> String {
    constants::DEFAULT_WEBSOCKET_URL.to_string()
}

fn default_max_attempts() -> u32 {
    constants::MAX_RECONNECT_ATTEMPTS
}

fn default_base_delay() -> u64 {
    constants::RECONNECT_BASE_DELAY_MS
}

fn default_growth_factor() -> f64 {
    constants::RECONNECT_GROWTH_FACTOR
}

fn default_max_delay() -> u64 {
    constants::RECONNECT_MAX_DELAY_MS
}

fn default_max_jitter() -> u64 {
    constants::RECONNECT_MAX_JITTER_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_reconnect_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            growth_factor: default_growth_factor(),
            max_delay_ms: default_max_delay(),
            max_jitter_ms: default_max_jitter(),
            connect_timeout_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl RealtimeConfig {
    /// Normalize a push endpoint address.
    ///
    /// Maps http(s) schemes onto ws(s), adds `ws://` when no scheme is given
    /// and strips surrounding quotes/whitespace. The path (including a
    /// trailing slash) is kept as is.
    pub fn sanitize_endpoint(address: &str) -> String {
        let trimmed = address.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
            trimmed.to_string()
        } else {
            format!("ws://{trimmed}")
        }
    }

    /// Check the values for internal consistency.
    pub fn validate(&self) -> RmsResult<()> {
        if self.url.is_empty() {
            return Err(RmsError::MissingConfig("realtime.url".into()));
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(RmsError::Config(format!(
                "realtime.url must use ws:// or wss://, got {}",
                self.url
            )));
        }
        if !self.growth_factor.is_finite() || self.growth_factor < 1.0 {
            return Err(RmsError::Config(format!(
                "realtime.growth_factor must be >= 1.0, got {}",
                self.growth_factor
            )));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(RmsError::Config(
                "realtime.max_delay_ms must not be smaller than realtime.base_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> RmsResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> RmsResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&contents)?;
        config.realtime.url = RealtimeConfig::sanitize_endpoint(&config.realtime.url);
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> RmsResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RmsError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> RmsResult<PathBuf> {
        Ok(Platform::config_dir()?.join("config.toml"))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(constants::WEBSOCKET_URL_ENV) {
            let url = RealtimeConfig::sanitize_endpoint(&url);
            if !url.is_empty() {
                tracing::debug!("realtime url overridden from {}", constants::WEBSOCKET_URL_ENV);
                self.realtime.url = url;
            }
        }
    }

    /// Get the effective token file path, using the configured path or the default.
    pub fn effective_token_path(&self) -> RmsResult<PathBuf> {
        if self.session.token_file.is_empty() {
            Platform::session_token_path()
        } else {
            Ok(PathBuf::from(&self.session.token_file))
        }
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> RmsResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Platform::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }
}
