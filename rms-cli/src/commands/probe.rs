//! Probe command - end-to-end smoke test of the realtime endpoint.
//!
//! Subscribes to order traffic, connects, sends a test message after a short
//! delay and reports whatever arrives in the listening window.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use console::style;

use rms_core::config::AppConfig;
use rms_core::error::{RmsError, RmsResult};
use rms_socket::Topic;

use super::TokenSource;

const SEND_DELAY: Duration = Duration::from_secs(2);

/// Run the probe command.
pub async fn run(config: &AppConfig, token: Option<String>, window_secs: u64) -> RmsResult<()> {
    let (session, source) = super::resolve_session(config, token, false)?;
    if source == TokenSource::Missing {
        println!(
            "  {} No authentication token found for the realtime test",
            style("FAIL").red().bold()
        );
        return Err(RmsError::MissingToken);
    }
    let channel = super::create_channel(config, session)?;

    println!(
        "{} Subscribing and connecting to {}...",
        style("[1/3]").bold().dim(),
        config.realtime.url
    );
    let status = super::print_status_changes();
    channel.on_connection_status_change(status.clone());

    let received = Arc::new(AtomicUsize::new(0));
    let order_updates = {
        let received = received.clone();
        channel.subscribe_fn(Topic::OrderStatusUpdate, move |payload| {
            received.fetch_add(1, Ordering::SeqCst);
            println!("  {} order status update: {payload}", style("<-").cyan());
        })
    };
    let new_orders = {
        let received = received.clone();
        channel.subscribe_fn(Topic::NewOrder, move |payload| {
            received.fetch_add(1, Ordering::SeqCst);
            println!("  {} new order: {payload}", style("<-").cyan());
        })
    };

    tokio::time::sleep(SEND_DELAY).await;

    println!("{} Sending test message...", style("[2/3]").bold().dim());
    let test_payload = serde_json::json!({
        "message": "WebSocket connection test",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    let sent = channel.send(Topic::OrderStatusUpdate.as_str(), &test_payload);
    if sent {
        println!("  {} Test message sent.", style("OK").green().bold());
    } else {
        println!(
            "  {} Channel is {}, test message not sent.",
            style("FAIL").red().bold(),
            channel.connection_state()
        );
    }

    println!(
        "{} Listening for {window_secs}s...",
        style("[3/3]").bold().dim()
    );
    tokio::time::sleep(Duration::from_secs(window_secs)).await;

    order_updates.unsubscribe();
    new_orders.unsubscribe();
    channel.off_connection_status_change(&status);
    channel.disconnect();

    println!(
        "  Received {} message(s), {} reconnect attempt(s) made.",
        received.load(Ordering::SeqCst),
        channel.reconnect_attempts()
    );
    if sent {
        Ok(())
    } else {
        Err(RmsError::SocketDisconnected)
    }
}
