//! Send command - publish a single envelope.

use std::time::Duration;

use console::style;
use tracing::error;

use rms_core::config::AppConfig;
use rms_core::error::{RmsError, RmsResult};

use super::TokenSource;

/// Run the send command.
pub async fn run(
    config: &AppConfig,
    token: Option<String>,
    topic: String,
    payload: String,
    wait_secs: u64,
) -> RmsResult<()> {
    let payload: serde_json::Value = serde_json::from_str(&payload)?;

    let (session, source) = super::resolve_session(config, token, true)?;
    if source == TokenSource::Missing {
        return Err(RmsError::MissingToken);
    }
    let channel = super::create_channel(config, session)?;

    channel.connect();
    if let Err(e) = channel.wait_until_connected(Duration::from_secs(wait_secs)).await {
        println!("  {} Could not connect: {e}", style("FAIL").red().bold());
        channel.disconnect();
        return Err(e);
    }

    let sent = channel.send(&topic, &payload);
    channel.disconnect();

    if sent {
        println!("  {} Sent {}", style("OK").green().bold(), style(&topic).cyan());
        Ok(())
    } else {
        error!("send on {topic} was not accepted");
        println!("  {} Send failed", style("FAIL").red().bold());
        Err(RmsError::Socket(format!("send on {topic} failed")))
    }
}
