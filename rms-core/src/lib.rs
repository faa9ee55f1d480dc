//! RMS Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by the other RMS crates:
//! - Application configuration (realtime endpoint, reconnect policy, session)
//! - Global error type covering all error categories
//! - Structured logging with tracing
//! - Platform data directories
//! - Session token store and network availability signal

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod network;
pub mod platform;
pub mod session;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use error::{RmsError, RmsResult};
pub use logging::init_logging;
pub use network::{NetworkMonitor, NetworkStatus};
pub use platform::Platform;
pub use session::{SessionStore, TokenProvider};
