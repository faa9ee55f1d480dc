//! Transport abstraction between the channel and the wire.
//!
//! A [`Connector`] turns a URL into a [`Transport`] handle. Opening is
//! asynchronous: `open` only issues the request, and the outcome (and
//! everything after it) arrives later as [`TransportEvent`]s on the
//! [`EventSink`] that was handed to the connector.

use std::fmt;
use std::sync::Arc;

use rms_core::error::RmsResult;

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// A close handshake took place (as opposed to a dropped or failed connection).
    pub clean: bool,
    /// WebSocket close code, when one was received.
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    /// Orderly closure with a close frame.
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            clean: true,
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Connection lost or never established (1006 semantics).
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            clean: false,
            code: Some(1006),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.clean { "clean" } else { "abnormal" };
        match self.code {
            Some(code) => write!(f, "{kind} close (code {code}): {}", self.reason),
            None => write!(f, "{kind} close: {}", self.reason),
        }
    }
}

/// Something that happened on a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The transport failed. Always followed by `Closed`.
    Error(String),
    /// The connection is gone.
    Closed(CloseInfo),
}

impl TransportEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Opened => "open",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::Closed(_) => "close",
        }
    }
}

/// Receiver of transport events for one connection attempt.
#[derive(Clone)]
pub struct EventSink {
    handler: Arc<dyn Fn(TransportEvent) + Send + Sync>,
}

impl EventSink {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn emit(&self, event: TransportEvent) {
        (self.handler)(event)
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// Handle to one live connection.
///
/// `send_text` must not emit events synchronously; `open` and `close` may.
pub trait Transport: Send + Sync {
    /// Hand one text frame to the transport. An `Ok` only means the frame
    /// was accepted for transmission.
    fn send_text(&self, text: String) -> RmsResult<()>;

    /// Start an orderly close.
    fn close(&self);
}

/// Factory for transports.
pub trait Connector: Send + Sync {
    /// Issue an open request for `url`; results arrive on `events`.
    fn open(&self, url: &str, events: EventSink) -> RmsResult<Box<dyn Transport>>;
}
