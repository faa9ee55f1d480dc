//! Listen command - print live updates for a set of topics.

use console::style;
use tracing::{info, warn};

use rms_core::config::AppConfig;
use rms_core::error::RmsResult;
use rms_socket::{ConnectionState, Envelope, Topic};

use super::TokenSource;
use crate::OutputFormat;

/// Run the listen command.
pub async fn run(
    config: &AppConfig,
    token: Option<String>,
    topics: Vec<String>,
    format: OutputFormat,
) -> RmsResult<()> {
    let (session, source) = super::resolve_session(config, token, true)?;
    if source == TokenSource::Missing {
        warn!("no session token; the channel will not connect");
    }
    let channel = super::create_channel(config, session)?;

    let topics: Vec<String> = if topics.is_empty() {
        Topic::all_topic_names().iter().map(|t| t.to_string()).collect()
    } else {
        topics
    };

    let status = super::print_status_changes();
    channel.on_connection_status_change(status.clone());

    let subscriptions: Vec<_> = topics
        .iter()
        .map(|topic| {
            let label = topic.clone();
            channel.subscribe_fn(topic.as_str(), move |payload| match format {
                OutputFormat::Json => {
                    let line = serde_json::json!({
                        "type": label,
                        "payload": payload,
                        "received_at": chrono::Utc::now().to_rfc3339(),
                    });
                    println!("{line}");
                }
                OutputFormat::Text => {
                    let envelope = Envelope::new(label.as_str(), payload.clone());
                    let topic = envelope.topic();
                    let name = if topic.is_order_topic() {
                        style(&label).yellow().bold()
                    } else if topic.is_table_topic() {
                        style(&label).green().bold()
                    } else {
                        style(&label).cyan().bold()
                    };
                    let body = summarize(&envelope).unwrap_or_else(|| payload.to_string());
                    println!("{} {} {}", style(super::timestamp()).dim(), name, body);
                }
            })
        })
        .collect();

    if channel.connection_state() == ConnectionState::Absent && channel.pending_reconnect_delay().is_none() {
        eprintln!(
            "{} not connecting: no session token or network offline",
            style("WARN").yellow().bold()
        );
    } else {
        eprintln!(
            "Listening on {} topic(s) at {}. Press Ctrl-C to stop.",
            topics.len(),
            config.realtime.url
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupted, closing realtime channel");

    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    channel.off_connection_status_change(&status);
    channel.disconnect();
    Ok(())
}

/// One-line summary for the well-known payload shapes.
fn summarize(envelope: &Envelope) -> Option<String> {
    if let Some(order) = envelope.as_order_status() {
        return Some(format!("order #{} -> {}", order.id, order.status));
    }
    if let Some(table) = envelope.as_table_status() {
        let seated = if table.current_order.is_some() { " (order seated)" } else { "" };
        return Some(format!("table #{} -> {}{seated}", table.id, table.status));
    }
    if let Some(reservation) = envelope.as_reservation_update() {
        let table = reservation
            .table_id
            .map_or_else(|| "unassigned".to_string(), |id| format!("table #{id}"));
        let effect = if reservation.affects_status { ", table reserved" } else { "" };
        return Some(format!("reservation for {table}{effect}"));
    }
    None
}
