//! Global error types for the restaurant realtime client.
//!
//! All error categories across the workspace are unified into a single
//! `RmsError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using RmsError.
pub type RmsResult<T> = Result<T, RmsError>;

/// Unified error type covering all error categories.
#[derive(Error, Debug)]
pub enum RmsError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Session errors --
    /// No bearer token is available for the realtime endpoint.
    #[error("no session token available")]
    MissingToken,

    // -- Network errors --
    /// The host reports that it is offline.
    #[error("network unavailable")]
    Offline,

    /// The realtime endpoint URL could not be built.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// WebSocket transport error.
    #[error("socket error: {0}")]
    Socket(String),

    /// The socket is not open.
    #[error("socket disconnected")]
    SocketDisconnected,

    /// Timed out waiting for the socket.
    #[error("socket timeout: {0}")]
    Timeout(String),

    // -- Runtime errors --
    /// No tokio runtime was available to drive background tasks.
    #[error("runtime error: {0}")]
    Runtime(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for RmsError {
    fn from(e: serde_json::Error) -> Self {
        RmsError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RmsError {
    fn from(e: toml::de::Error) -> Self {
        RmsError::Config(e.to_string())
    }
}

impl RmsError {
    /// Whether retrying the operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Offline | Self::Socket(_) | Self::SocketDisconnected | Self::Timeout(_)
        )
    }
}
