//! CLI command implementations.

pub mod listen;
pub mod probe;
pub mod send;
pub mod status;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use dialoguer::{Confirm, Password};
use tracing::debug;

use rms_core::config::AppConfig;
use rms_core::constants::TOKEN_ENV;
use rms_core::error::{RmsError, RmsResult};
use rms_core::network::NetworkMonitor;
use rms_core::session::{SessionStore, TokenProvider};
use rms_socket::{RealtimeChannel, StatusCallback, WsConnector};

/// Where the session token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Flag,
    Environment,
    SavedSession,
    Prompt,
    Missing,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Flag => "--token",
            Self::Environment => TOKEN_ENV,
            Self::SavedSession => "saved session",
            Self::Prompt => "prompt",
            Self::Missing => "none",
        };
        f.write_str(s)
    }
}

/// Resolve the session token: flag > environment > saved session > prompt.
///
/// The prompt is only shown when `interactive` is set and a terminal is attached.
pub fn resolve_session(
    config: &AppConfig,
    flag_token: Option<String>,
    interactive: bool,
) -> RmsResult<(SessionStore, TokenSource)> {
    let env_token = std::env::var(TOKEN_ENV).ok();
    let session = SessionStore::new(config.effective_token_path()?);
    let source = resolve_into(&session, flag_token, env_token);
    if source != TokenSource::Missing || !interactive || !console::user_attended() {
        return Ok((session, source));
    }

    let token: String = Password::new()
        .with_prompt("Session token")
        .interact()
        .map_err(|e| RmsError::Internal(e.to_string()))?;
    let remember = Confirm::new()
        .with_prompt("Remember this token?")
        .default(false)
        .interact()
        .map_err(|e| RmsError::Internal(e.to_string()))?;
    if remember {
        session.login(&token)?;
    } else {
        session.set_token(Some(token));
    }
    Ok((session, TokenSource::Prompt))
}

fn resolve_into(
    session: &SessionStore,
    flag_token: Option<String>,
    env_token: Option<String>,
) -> TokenSource {
    let non_empty = |t: &String| !t.trim().is_empty();
    if let Some(token) = flag_token.filter(non_empty) {
        session.set_token(Some(token));
        TokenSource::Flag
    } else if let Some(token) = env_token.filter(non_empty) {
        session.set_token(Some(token));
        TokenSource::Environment
    } else if session.current_token().is_some() {
        TokenSource::SavedSession
    } else {
        TokenSource::Missing
    }
}

/// Build a channel over the real WebSocket transport.
pub fn create_channel(config: &AppConfig, session: SessionStore) -> RmsResult<RealtimeChannel> {
    let connector = WsConnector::new()?
        .with_connect_timeout(Duration::from_millis(config.realtime.connect_timeout_ms));
    debug!("realtime endpoint {}", config.realtime.url);
    RealtimeChannel::new(
        &config.realtime,
        Arc::new(connector),
        Arc::new(session),
        Arc::new(NetworkMonitor::default()),
    )
}

/// Status listener that prints connection changes.
pub fn print_status_changes() -> StatusCallback {
    Arc::new(|connected: bool| {
        if connected {
            eprintln!("{} connected", style("●").green().bold());
        } else {
            eprintln!("{} disconnected", style("●").red().bold());
        }
    })
}

/// Wall-clock prefix for printed updates.
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}
