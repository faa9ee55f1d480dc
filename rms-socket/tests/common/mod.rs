//! Shared test utilities for realtime channel integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rms_core::config::RealtimeConfig;
use rms_core::error::{RmsError, RmsResult};
use rms_core::network::NetworkMonitor;
use rms_core::session::SessionStore;
use rms_socket::{
    CloseInfo, Connector, EventSink, RealtimeChannel, StatusCallback, Transport, TransportEvent,
};

/// One transport handed out by [`MockConnector`].
pub struct MockConnection {
    pub url: String,
    pub events: EventSink,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockConnection {
    pub fn open(&self) {
        self.events.emit(TransportEvent::Opened);
    }

    pub fn receive(&self, frame: &str) {
        self.events.emit(TransportEvent::Message(frame.to_string()));
    }

    pub fn error(&self, message: &str) {
        self.events.emit(TransportEvent::Error(message.to_string()));
    }

    pub fn drop_abnormally(&self) {
        self.events
            .emit(TransportEvent::Closed(CloseInfo::abnormal("connection reset")));
    }

    pub fn close_cleanly(&self) {
        self.events
            .emit(TransportEvent::Closed(CloseInfo::clean(1000, "normal closure")));
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn sent_frames(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str(text).expect("sent frame is not JSON"))
            .collect()
    }
}

struct MockTransport {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    fail_sends: bool,
}

impl Transport for MockTransport {
    fn send_text(&self, text: String) -> RmsResult<()> {
        if self.fail_sends || self.closed.load(Ordering::SeqCst) {
            return Err(RmsError::SocketDisconnected);
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector that records every open and lets tests drive transport events.
#[derive(Default)]
pub struct MockConnector {
    connections: Mutex<Vec<Arc<MockConnection>>>,
    fail_opens: AtomicBool,
    fail_sends: AtomicBool,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of `open` calls, including refused ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of transports actually created.
    pub fn open_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn last(&self) -> Arc<MockConnection> {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection was opened")
    }

    pub fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.connections.lock().unwrap()[index].clone()
    }

    pub fn refuse_opens(&self, refuse: bool) {
        self.fail_opens.store(refuse, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

impl Connector for MockConnector {
    fn open(&self, url: &str, events: EventSink) -> RmsResult<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(RmsError::Socket("connection refused".into()));
        }
        let connection = Arc::new(MockConnection {
            url: url.to_string(),
            events,
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        });
        self.connections.lock().unwrap().push(connection.clone());
        Ok(Box::new(MockTransport {
            sent: connection.sent.clone(),
            closed: connection.closed.clone(),
            fail_sends: self.fail_sends.load(Ordering::SeqCst),
        }))
    }
}

/// Everything a channel test needs to steer the channel's collaborators.
pub struct Harness {
    pub channel: RealtimeChannel,
    pub connector: Arc<MockConnector>,
    pub session: SessionStore,
    pub network: NetworkMonitor,
}

pub fn harness() -> Harness {
    harness_with(RealtimeConfig::default())
}

pub fn harness_with(config: RealtimeConfig) -> Harness {
    let connector = MockConnector::new();
    let session = SessionStore::in_memory();
    session.set_token(Some("test-jwt".into()));
    let network = NetworkMonitor::default();
    let channel = RealtimeChannel::new(
        &config,
        connector.clone(),
        Arc::new(session.clone()),
        Arc::new(network.clone()),
    )
    .expect("failed to create channel");
    Harness {
        channel,
        connector,
        session,
        network,
    }
}

/// Status listener that records every notification.
pub fn status_recorder() -> (Arc<Mutex<Vec<bool>>>, StatusCallback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let callback: StatusCallback = {
        let seen = seen.clone();
        Arc::new(move |connected: bool| seen.lock().unwrap().push(connected))
    };
    (seen, callback)
}

/// Message subscriber that records every payload.
pub fn payload_recorder() -> (Arc<Mutex<Vec<serde_json::Value>>>, rms_socket::MessageCallback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let callback: rms_socket::MessageCallback = {
        let seen = seen.clone();
        Arc::new(move |payload: &serde_json::Value| seen.lock().unwrap().push(payload.clone()))
    };
    (seen, callback)
}
