//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! Each `open` spawns one task that owns the socket. Outgoing frames reach
//! the task through an unbounded channel, so `send_text` never blocks.
//! The task reports `Opened`, every text frame, and exactly one `Closed`
//! (preceded by `Error` when the connection failed).

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tracing::{debug, warn};

use rms_core::error::{RmsError, RmsResult};

use crate::transport::{CloseInfo, Connector, EventSink, Transport, TransportEvent};

enum WsCommand {
    Send(String),
    Close,
}

/// [`Connector`] for `ws://` endpoints.
#[derive(Debug, Clone)]
pub struct WsConnector {
    runtime: Handle,
    connect_timeout: Option<Duration>,
}

impl WsConnector {
    /// Create a connector that spawns its socket tasks on the current runtime.
    pub fn new() -> RmsResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| RmsError::Runtime(format!("websocket connector needs a tokio runtime: {e}")))?;
        Ok(Self {
            runtime,
            connect_timeout: None,
        })
    }

    /// Give up on the opening handshake after `timeout`. Zero disables it.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str, events: EventSink) -> RmsResult<Box<dyn Transport>> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        self.runtime.spawn(run_socket(
            url.to_string(),
            self.connect_timeout,
            commands_rx,
            events,
        ));
        Ok(Box::new(WsTransport { commands: commands_tx }))
    }
}

struct WsTransport {
    commands: mpsc::UnboundedSender<WsCommand>,
}

impl Transport for WsTransport {
    fn send_text(&self, text: String) -> RmsResult<()> {
        self.commands
            .send(WsCommand::Send(text))
            .map_err(|_| RmsError::SocketDisconnected)
    }

    fn close(&self) {
        let _ = self.commands.send(WsCommand::Close);
    }
}

fn fail(events: &EventSink, message: String) {
    events.emit(TransportEvent::Error(message.clone()));
    events.emit(TransportEvent::Closed(CloseInfo::abnormal(message)));
}

/// Classify a close frame sent by the server.
///
/// Only a normal closure (1000) or a bare close frame is clean. Going away,
/// server errors and restarts are treated as a lost connection so the
/// channel retries.
fn server_close_info(frame: Option<CloseFrame<'_>>) -> CloseInfo {
    match frame {
        Some(f) if f.code == CloseCode::Normal => CloseInfo::clean(1000, f.reason.to_string()),
        Some(f) => CloseInfo {
            clean: false,
            code: Some(u16::from(f.code)),
            reason: f.reason.to_string(),
        },
        None => CloseInfo {
            clean: true,
            code: None,
            reason: "server closed connection".into(),
        },
    }
}

async fn run_socket(
    url: String,
    connect_timeout: Option<Duration>,
    mut commands: mpsc::UnboundedReceiver<WsCommand>,
    events: EventSink,
) {
    let handshake = tokio_tungstenite::connect_async(url.as_str());
    let result = match connect_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, handshake).await {
            Ok(result) => result,
            Err(_) => {
                fail(&events, format!("connect timeout ({}ms)", timeout.as_millis()));
                return;
            }
        },
        None => handshake.await,
    };

    let stream = match result {
        Ok((stream, _response)) => stream,
        Err(e) => {
            fail(&events, format!("connection failed: {e}"));
            return;
        }
    };

    events.emit(TransportEvent::Opened);
    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(WsCommand::Send(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        fail(&events, format!("send failed: {e}"));
                        return;
                    }
                }
                Some(WsCommand::Close) | None => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client disconnect".into(),
                    };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        debug!("close frame not delivered: {e}");
                    }
                    let _ = sink.close().await;
                    events.emit(TransportEvent::Closed(CloseInfo::clean(1000, "client disconnect")));
                    return;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    events.emit(TransportEvent::Message(text.as_str().to_string()));
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!("ignoring {} byte binary frame", data.len());
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let info = server_close_info(frame);
                    // Completes the close handshake.
                    let _ = sink.close().await;
                    events.emit(TransportEvent::Closed(info));
                    return;
                }
                Some(Err(e)) => {
                    warn!("websocket read error: {e}");
                    fail(&events, e.to_string());
                    return;
                }
                None => {
                    events.emit(TransportEvent::Closed(CloseInfo::abnormal("stream ended")));
                    return;
                }
            },
        }
    }
}
