//! Status command - show the resolved realtime configuration.

use console::style;

use rms_core::config::AppConfig;
use rms_core::error::RmsResult;
use rms_core::platform::Platform;
use rms_core::session::SessionStore;
use rms_socket::{ReconnectConfig, Topic};

use super::TokenSource;
use crate::OutputFormat;

/// Run the status command.
pub async fn run(config: &AppConfig, token: Option<String>, format: OutputFormat) -> RmsResult<()> {
    let (session, source) = super::resolve_session(config, token, false)?;
    let policy = ReconnectConfig::from(&config.realtime);
    let token_path = session.persist_path().map(|p| p.display().to_string());

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "platform": Platform::current().name(),
                "endpoint": config.realtime.url,
                "token_available": source != TokenSource::Missing,
                "token_source": source.to_string(),
                "token_file": token_path,
                "reconnect": {
                    "max_attempts": policy.max_attempts,
                    "base_delay_ms": policy.base_delay.as_millis() as u64,
                    "growth_factor": policy.growth_factor,
                    "max_delay_ms": policy.max_delay.as_millis() as u64,
                    "max_jitter_ms": policy.max_jitter.as_millis() as u64,
                    "connect_timeout_ms": config.realtime.connect_timeout_ms,
                },
                "topics": Topic::all_topic_names(),
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Text => {
            println!("{}", style("Realtime Channel").bold().underlined());
            println!("  Platform:      {}", Platform::current());
            println!("  Endpoint:      {}", config.realtime.url);
            println!(
                "  Token:         {}",
                if source == TokenSource::Missing {
                    style("missing".to_string()).red()
                } else {
                    style(format!("available ({source})")).green()
                }
            );
            if let Some(path) = token_path {
                println!("  Session file:  {path}");
            }
            println!();
            println!("{}", style("Reconnect Policy").bold().underlined());
            println!("  Max attempts:  {}", policy.max_attempts);
            println!(
                "  Delay:         {}ms x {}^n, capped at {}ms, + jitter < {}ms",
                policy.base_delay.as_millis(),
                policy.growth_factor,
                policy.max_delay.as_millis(),
                policy.max_jitter.as_millis()
            );
            println!("  Worst case:    {}ms", policy.max_total_delay().as_millis());
            if config.realtime.connect_timeout_ms > 0 {
                println!("  Open timeout:  {}ms", config.realtime.connect_timeout_ms);
            }
            println!();
            println!("{}", style("Known Topics").bold().underlined());
            for topic in Topic::all_topic_names() {
                println!("  {topic}");
            }
        }
    }

    Ok(())
}

/// Forget the saved session token.
pub fn logout(config: &AppConfig) -> RmsResult<()> {
    let session = SessionStore::new(config.effective_token_path()?);
    session.logout()?;
    println!("  {} Session token removed.", style("OK").green().bold());
    Ok(())
}
