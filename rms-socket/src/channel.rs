//! Realtime channel: one shared push connection for the whole application.
//!
//! The channel owns a single transport to the restaurant push endpoint and
//! multiplexes every topic over it. It handles:
//! - Authentication with the current session token on every connect
//! - Routing inbound envelopes to the subscribers of their topic
//! - Fire-and-forget sends while the connection is open
//! - Connection-status notifications independent of topics
//! - Reconnection with bounded exponential backoff and jitter after abnormal closes
//!
//! All state sits behind one mutex and every transition runs to completion
//! under it. Callbacks, transport opens and transport closes happen after
//! the lock is released, so subscribers may call back into the channel.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use rms_core::config::RealtimeConfig;
use rms_core::constants::TOKEN_QUERY_PARAM;
use rms_core::error::{RmsError, RmsResult};
use rms_core::network::NetworkStatus;
use rms_core::session::TokenProvider;

use crate::backoff::ReconnectConfig;
use crate::events::{ConnectionState, Envelope};
use crate::registry::{
    deliver, notify_status, MessageCallback, StatusCallback, StatusListeners,
    SubscriptionRegistry,
};
use crate::transport::{Connector, EventSink, Transport, TransportEvent};

/// Append the bearer token to the endpoint as a URL-encoded query parameter.
pub fn build_endpoint_url(base: &str, token: &str) -> RmsResult<String> {
    let mut url = Url::parse(base).map_err(|e| RmsError::InvalidUrl(format!("{base}: {e}")))?;
    url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
    Ok(url.to_string())
}

/// Endpoint with the token replaced, for logs.
fn redacted(base: &str) -> String {
    format!("{base}?{TOKEN_QUERY_PARAM}=[REDACTED]")
}

struct PendingReconnect {
    token: u64,
    delay: Duration,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct ReconnectState {
    attempts: u32,
    timer: Option<PendingReconnect>,
    next_token: u64,
}

impl ReconnectState {
    fn cancel(&mut self) {
        if let Some(pending) = self.timer.take() {
            pending.handle.abort();
            debug!("cancelled pending reconnect");
        }
    }
}

struct ChannelState {
    connection: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    /// Identifies the current transport; events tagged otherwise are stale.
    generation: u64,
    reconnect: ReconnectState,
    subscriptions: SubscriptionRegistry,
    status_listeners: StatusListeners,
}

/// Work that must happen after the state lock is released.
enum Effect {
    Status(Vec<StatusCallback>, bool),
    Deliver {
        topic: String,
        payload: serde_json::Value,
        callbacks: Vec<MessageCallback>,
    },
    Close(Box<dyn Transport>),
    Release(Box<dyn Transport>),
}

fn run_effects(effects: Vec<Effect>) {
    for effect in effects {
        match effect {
            Effect::Status(listeners, connected) => notify_status(connected, &listeners),
            Effect::Deliver {
                topic,
                payload,
                callbacks,
            } => deliver(&topic, &payload, &callbacks),
            Effect::Close(transport) => transport.close(),
            Effect::Release(transport) => drop(transport),
        }
    }
}

struct Inner {
    base_url: String,
    policy: ReconnectConfig,
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenProvider>,
    network: Arc<dyn NetworkStatus>,
    runtime: Handle,
    state: Mutex<ChannelState>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        state.reconnect.cancel();
        if let Some(transport) = state.transport.take() {
            transport.close();
        }
    }
}

/// Shared realtime connection.
///
/// Cloning is cheap and every clone drives the same connection. Construct
/// one at the composition root and hand clones to whoever needs it.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<Inner>,
}

/// Registration returned by [`RealtimeChannel::subscribe`].
///
/// Dropping it keeps the subscription alive; call [`Subscription::unsubscribe`]
/// when the owner goes away.
#[must_use = "keep the subscription to be able to unsubscribe later"]
pub struct Subscription {
    channel: Weak<Inner>,
    topic: String,
    callback: MessageCallback,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Remove exactly this (topic, callback) registration.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.channel.upgrade() {
            RealtimeChannel { inner }.unsubscribe(&self.topic, &self.callback);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl RealtimeChannel {
    /// Create a channel. Nothing connects until [`connect`](Self::connect)
    /// or the first [`subscribe`](Self::subscribe).
    ///
    /// Must be called from within a tokio runtime; reconnect timers are
    /// spawned on it.
    pub fn new(
        config: &RealtimeConfig,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenProvider>,
        network: Arc<dyn NetworkStatus>,
    ) -> RmsResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| RmsError::Runtime(format!("realtime channel needs a tokio runtime: {e}")))?;
        let (state_tx, _) = watch::channel(ConnectionState::Absent);

        Ok(Self {
            inner: Arc::new(Inner {
                base_url: config.url.clone(),
                policy: ReconnectConfig::from(config),
                connector,
                tokens,
                network,
                runtime,
                state: Mutex::new(ChannelState {
                    connection: ConnectionState::Absent,
                    transport: None,
                    generation: 0,
                    reconnect: ReconnectState::default(),
                    subscriptions: SubscriptionRegistry::default(),
                    status_listeners: StatusListeners::default(),
                }),
                state_tx,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_connection(&self, state: &mut ChannelState, next: ConnectionState) {
        if state.connection != next {
            debug!("realtime state: {} -> {}", state.connection, next);
            state.connection = next;
            self.inner.state_tx.send_replace(next);
        }
    }

    /// Detach and close the current transport, cancel any pending reconnect
    /// and go to `Absent`.
    fn teardown(&self, state: &mut ChannelState, effects: &mut Vec<Effect>) {
        state.generation += 1;
        if let Some(transport) = state.transport.take() {
            effects.push(Effect::Close(transport));
        }
        state.reconnect.cancel();
        self.set_connection(state, ConnectionState::Absent);
    }

    fn resolve_url(&self) -> RmsResult<String> {
        let token = self.inner.tokens.current_token().ok_or(RmsError::MissingToken)?;
        if !self.inner.network.is_online() {
            return Err(RmsError::Offline);
        }
        build_endpoint_url(&self.inner.base_url, &token)
    }

    fn event_sink(&self, generation: u64) -> EventSink {
        let inner = Arc::downgrade(&self.inner);
        EventSink::new(move |event| {
            if let Some(inner) = inner.upgrade() {
                RealtimeChannel { inner }.handle_event(generation, event);
            }
        })
    }

    /// Open the connection unless it is already open or opening.
    ///
    /// Without a token, or while offline, this logs and returns without
    /// changing state or scheduling a retry.
    pub fn connect(&self) {
        let mut effects = Vec::new();
        let prepared = {
            let mut state = self.lock();
            if state.connection.is_active() {
                debug!("already {}, skipping connect", state.connection);
                return;
            }
            self.teardown(&mut state, &mut effects);
            match self.resolve_url() {
                Ok(url) => {
                    self.set_connection(&mut state, ConnectionState::Connecting);
                    Some((url, state.generation))
                }
                Err(e) if e.is_transient() => {
                    warn!("not connecting: {e}");
                    None
                }
                Err(e) => {
                    error!("not connecting: {e}");
                    None
                }
            }
        };
        run_effects(effects);

        let Some((url, generation)) = prepared else {
            return;
        };

        info!("realtime connecting to {}", redacted(&self.inner.base_url));
        match self.inner.connector.open(&url, self.event_sink(generation)) {
            Ok(transport) => {
                let mut state = self.lock();
                if state.generation == generation && state.connection != ConnectionState::Absent {
                    state.transport = Some(transport);
                } else {
                    drop(state);
                    debug!("connection superseded while opening, closing it");
                    transport.close();
                }
            }
            Err(e) => {
                error!("failed to open realtime connection: {e}");
                let mut state = self.lock();
                if state.generation == generation {
                    self.set_connection(&mut state, ConnectionState::Absent);
                    self.schedule_reconnect(&mut state);
                }
            }
        }
    }

    /// Tear the connection down and stop reconnecting. Safe in any state.
    pub fn disconnect(&self) {
        let mut effects = Vec::new();
        {
            let mut state = self.lock();
            let prior = state.connection;
            self.teardown(&mut state, &mut effects);
            if prior.is_active() && !state.status_listeners.is_empty() {
                effects.push(Effect::Status(state.status_listeners.snapshot(), false));
            }
            if prior != ConnectionState::Absent {
                info!("realtime channel disconnected");
            }
        }
        run_effects(effects);
    }

    /// Register `callback` for `topic`. Connects when no connection exists.
    pub fn subscribe(&self, topic: impl Into<String>, callback: MessageCallback) -> Subscription {
        let topic = topic.into();
        let should_connect = {
            let mut state = self.lock();
            if state.subscriptions.insert(&topic, callback.clone()) {
                debug!(
                    "subscribed to {topic} ({} subscriber(s))",
                    state.subscriptions.subscriber_count(&topic)
                );
            }
            state.connection == ConnectionState::Absent
        };
        if should_connect {
            self.connect();
        }
        Subscription {
            channel: Arc::downgrade(&self.inner),
            topic,
            callback,
        }
    }

    /// Convenience wrapper around [`subscribe`](Self::subscribe) for closures.
    pub fn subscribe_fn<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.subscribe(topic, Arc::new(callback))
    }

    /// Subscribe with a typed payload. Payloads that do not deserialize
    /// into `T` are logged and skipped.
    pub fn subscribe_typed<T, F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let label = topic.clone();
        self.subscribe_fn(topic, move |payload| {
            match serde_json::from_value::<T>(payload.clone()) {
                Ok(value) => callback(value),
                Err(e) => warn!("unexpected payload on {label}: {e}"),
            }
        })
    }

    /// Remove a registration. No-op when it does not exist.
    pub fn unsubscribe(&self, topic: &str, callback: &MessageCallback) {
        let mut state = self.lock();
        if state.subscriptions.remove(topic, callback) {
            debug!("unsubscribed from {topic}");
        }
    }

    /// Send one envelope. Returns true only if the connection is open and
    /// the transport accepted the frame; nothing is queued or retried.
    pub fn send<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) -> bool {
        let text = match serde_json::to_value(payload)
            .map_err(RmsError::from)
            .and_then(|payload| Envelope::new(topic, payload).encode())
        {
            Ok(text) => text,
            Err(e) => {
                error!("cannot encode {topic} message: {e}");
                return false;
            }
        };

        let state = self.lock();
        let transport = match (state.connection, state.transport.as_ref()) {
            (ConnectionState::Open, Some(transport)) => transport,
            _ => {
                warn!("cannot send {topic}: channel is {}", state.connection);
                return false;
            }
        };
        match transport.send_text(text) {
            Ok(()) => {
                debug!("sent {topic}");
                true
            }
            Err(e) => {
                warn!("sending {topic} failed: {e}");
                false
            }
        }
    }

    /// Register a status listener and call it right away with the current status.
    pub fn on_connection_status_change(&self, callback: StatusCallback) {
        let connected = {
            let mut state = self.lock();
            state.status_listeners.add(callback.clone());
            state.connection == ConnectionState::Open
        };
        notify_status(connected, &[callback]);
    }

    /// Remove a status listener. No-op when absent.
    pub fn off_connection_status_change(&self, callback: &StatusCallback) {
        self.lock().status_listeners.remove(callback);
    }

    /// True only while the connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Open
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock().connection
    }

    /// Watch connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until the connection is open, or fail after `timeout`.
    pub async fn wait_until_connected(&self, timeout: Duration) -> RmsResult<()> {
        let mut rx = self.state_receiver();
        let wait = rx.wait_for(|state| *state == ConnectionState::Open);
        let result = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(RmsError::SocketDisconnected),
            Err(_) => Err(RmsError::Timeout(format!(
                "not connected after {}ms",
                timeout.as_millis()
            ))),
        };
        result
    }

    /// Consecutive reconnect attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.lock().reconnect.attempts
    }

    /// Delay of the reconnect currently scheduled, if any.
    pub fn pending_reconnect_delay(&self) -> Option<Duration> {
        self.lock().reconnect.timer.as_ref().map(|pending| pending.delay)
    }

    pub fn reconnect_policy(&self) -> &ReconnectConfig {
        &self.inner.policy
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.base_url
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().subscriptions.subscriber_count(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.lock().subscriptions.topic_count()
    }

    /// Topics that currently have at least one subscriber.
    pub fn topics(&self) -> Vec<String> {
        self.lock().subscriptions.topics()
    }

    /// Single transition function for everything a transport reports.
    fn handle_event(&self, generation: u64, event: TransportEvent) {
        let mut effects = Vec::new();
        {
            let mut state = self.lock();
            if state.generation != generation {
                debug!("ignoring {} event from a detached transport", event.kind());
                return;
            }

            match event {
                TransportEvent::Opened => {
                    info!("realtime connection open");
                    self.set_connection(&mut state, ConnectionState::Open);
                    state.reconnect.attempts = 0;
                    effects.push(Effect::Status(state.status_listeners.snapshot(), true));
                }
                TransportEvent::Message(text) => match Envelope::decode(&text) {
                    Ok(envelope) => {
                        let callbacks = state.subscriptions.callbacks(&envelope.topic);
                        if callbacks.is_empty() {
                            debug!("no subscribers for {}", envelope.topic);
                        } else {
                            effects.push(Effect::Deliver {
                                topic: envelope.topic,
                                payload: envelope.payload,
                                callbacks,
                            });
                        }
                    }
                    Err(e) => warn!("dropping malformed realtime frame: {e}"),
                },
                TransportEvent::Error(message) => {
                    error!("realtime transport error: {message}");
                    match state.connection {
                        ConnectionState::Open => {
                            self.set_connection(&mut state, ConnectionState::Closing);
                            effects.push(Effect::Status(state.status_listeners.snapshot(), false));
                        }
                        // The close that follows decides whether to retry.
                        ConnectionState::Connecting => {
                            effects.push(Effect::Status(state.status_listeners.snapshot(), false));
                        }
                        ConnectionState::Absent | ConnectionState::Closing => {}
                    }
                }
                TransportEvent::Closed(close) => {
                    let was_open = state.connection == ConnectionState::Open;
                    if let Some(transport) = state.transport.take() {
                        effects.push(Effect::Release(transport));
                    }
                    self.set_connection(&mut state, ConnectionState::Absent);
                    if was_open {
                        effects.push(Effect::Status(state.status_listeners.snapshot(), false));
                    }
                    if close.clean {
                        info!("realtime connection closed: {close}");
                    } else {
                        warn!("realtime connection lost: {close}");
                        self.schedule_reconnect(&mut state);
                    }
                }
            }
        }
        run_effects(effects);
    }

    fn schedule_reconnect(&self, state: &mut ChannelState) {
        let attempts = state.reconnect.attempts;
        if !self.inner.policy.allows_attempt(attempts) {
            // Terminal until somebody calls connect() again.
            error!(
                "maximum reconnection attempts ({}) reached, staying disconnected",
                self.inner.policy.max_attempts
            );
            return;
        }

        state.reconnect.cancel();
        let delay = self.inner.policy.reconnect_delay(attempts);
        state.reconnect.next_token += 1;
        let token = state.reconnect.next_token;

        let inner = Arc::downgrade(&self.inner);
        let handle = self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                RealtimeChannel { inner }.fire_reconnect(token);
            }
        });

        info!(
            "scheduling reconnect attempt {} in {}ms",
            attempts + 1,
            delay.as_millis()
        );
        state.reconnect.timer = Some(PendingReconnect {
            token,
            delay,
            handle,
        });
    }

    fn fire_reconnect(&self, token: u64) {
        {
            let mut state = self.lock();
            match &state.reconnect.timer {
                Some(pending) if pending.token == token => {}
                _ => {
                    debug!("ignoring stale reconnect timer");
                    return;
                }
            }
            // Taken, not aborted: this is the timer task itself.
            state.reconnect.timer = None;
            state.reconnect.attempts += 1;
        }
        self.connect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rms_core::network::NetworkMonitor;
    use rms_core::session::SessionStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Connector that records URLs and keeps the sinks so tests can drive events.
    #[derive(Default)]
    struct ScriptedConnector {
        opened: Mutex<Vec<(String, EventSink)>>,
        sent: Arc<Mutex<Vec<String>>>,
        closes: Arc<AtomicUsize>,
        fail_open: std::sync::atomic::AtomicBool,
    }

    struct ScriptedTransport {
        sent: Arc<Mutex<Vec<String>>>,
        closes: Arc<AtomicUsize>,
    }

    impl Transport for ScriptedTransport {
        fn send_text(&self, text: String) -> RmsResult<()> {
            self.sent.lock().unwrap().push(text);
            Ok(())
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Connector for ScriptedConnector {
        fn open(&self, url: &str, events: EventSink) -> RmsResult<Box<dyn Transport>> {
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(RmsError::Socket("refused".into()));
            }
            self.opened.lock().unwrap().push((url.to_string(), events));
            Ok(Box::new(ScriptedTransport {
                sent: self.sent.clone(),
                closes: self.closes.clone(),
            }))
        }
    }

    impl ScriptedConnector {
        fn open_count(&self) -> usize {
            self.opened.lock().unwrap().len()
        }

        fn emit_last(&self, event: TransportEvent) {
            let sink = self.opened.lock().unwrap().last().unwrap().1.clone();
            sink.emit(event);
        }
    }

    fn channel_with(connector: Arc<ScriptedConnector>, token: Option<&str>) -> RealtimeChannel {
        let session = SessionStore::in_memory();
        session.set_token(token.map(str::to_string));
        RealtimeChannel::new(
            &RealtimeConfig::default(),
            connector,
            Arc::new(session),
            Arc::new(NetworkMonitor::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_requires_runtime() {
        let result = RealtimeChannel::new(
            &RealtimeConfig::default(),
            Arc::new(ScriptedConnector::default()),
            Arc::new(SessionStore::in_memory()),
            Arc::new(NetworkMonitor::default()),
        );
        assert!(matches!(result, Err(RmsError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = RealtimeConfig {
            url: "http://not-a-socket".into(),
            ..RealtimeConfig::default()
        };
        let result = RealtimeChannel::new(
            &config,
            Arc::new(ScriptedConnector::default()),
            Arc::new(SessionStore::in_memory()),
            Arc::new(NetworkMonitor::default()),
        );
        assert!(matches!(result, Err(RmsError::Config(_))));
    }

    #[test]
    fn test_build_endpoint_url_encodes_token() {
        let url = build_endpoint_url("ws://localhost:8000/ws/restaurant/", "a b&c=d").unwrap();
        assert_eq!(url, "ws://localhost:8000/ws/restaurant/?token=a+b%26c%3Dd");
        assert!(matches!(
            build_endpoint_url("::nope::", "t"),
            Err(RmsError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let connector = Arc::new(ScriptedConnector::default());
        let channel = channel_with(connector.clone(), Some("jwt"));

        channel.connect();
        channel.connect();
        assert_eq!(connector.open_count(), 1);
        assert_eq!(channel.connection_state(), ConnectionState::Connecting);

        connector.emit_last(TransportEvent::Opened);
        channel.connect();
        assert_eq!(connector.open_count(), 1);
        assert!(channel.is_connected());
    }

    #[tokio::test]
    async fn test_connect_without_token_is_silent_noop() {
        let connector = Arc::new(ScriptedConnector::default());
        let channel = channel_with(connector.clone(), None);

        channel.connect();
        assert_eq!(connector.open_count(), 0);
        assert_eq!(channel.connection_state(), ConnectionState::Absent);
        assert_eq!(channel.pending_reconnect_delay(), None);
    }

    #[tokio::test]
    async fn test_open_failure_schedules_reconnect() {
        let connector = Arc::new(ScriptedConnector::default());
        connector.fail_open.store(true, Ordering::SeqCst);
        let channel = channel_with(connector.clone(), Some("jwt"));

        channel.connect();
        assert_eq!(channel.connection_state(), ConnectionState::Absent);
        assert!(channel.pending_reconnect_delay().is_some());
        channel.disconnect();
        assert_eq!(channel.pending_reconnect_delay(), None);
    }

    #[tokio::test]
    async fn test_error_flips_status_without_reconnect() {
        let connector = Arc::new(ScriptedConnector::default());
        let channel = channel_with(connector.clone(), Some("jwt"));
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let listener: StatusCallback = {
            let statuses = statuses.clone();
            Arc::new(move |connected: bool| statuses.lock().unwrap().push(connected))
        };
        channel.on_connection_status_change(listener);

        channel.connect();
        connector.emit_last(TransportEvent::Opened);
        connector.emit_last(TransportEvent::Error("reset by peer".into()));
        assert!(!channel.is_connected());
        assert_eq!(channel.connection_state(), ConnectionState::Closing);
        assert_eq!(channel.pending_reconnect_delay(), None);
        assert!(!channel.send("new_order", &serde_json::json!({})));

        connector.emit_last(TransportEvent::Closed(crate::transport::CloseInfo::abnormal(
            "reset by peer",
        )));
        assert_eq!(channel.connection_state(), ConnectionState::Absent);
        assert!(channel.pending_reconnect_delay().is_some());
        // Replay, open, error. The close does not repeat `false`.
        assert_eq!(*statuses.lock().unwrap(), vec![false, true, false]);
        channel.disconnect();
    }

    #[tokio::test]
    async fn test_send_encodes_envelope() {
        let connector = Arc::new(ScriptedConnector::default());
        let channel = channel_with(connector.clone(), Some("jwt"));
        channel.connect();
        connector.emit_last(TransportEvent::Opened);

        assert!(channel.send("table_status_update", &serde_json::json!({"id": 2, "status": "free"})));
        let sent = connector.sent.lock().unwrap().clone();
        let frame: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(
            frame,
            serde_json::json!({"type": "table_status_update", "payload": {"id": 2, "status": "free"}})
        );
    }

    #[tokio::test]
    async fn test_disconnect_closes_transport_and_detaches_it() {
        let connector = Arc::new(ScriptedConnector::default());
        let channel = channel_with(connector.clone(), Some("jwt"));
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = {
            let hits = hits.clone();
            channel.subscribe_fn("new_order", move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        connector.emit_last(TransportEvent::Opened);

        channel.disconnect();
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
        assert_eq!(channel.connection_state(), ConnectionState::Absent);

        // A late frame from the detached transport is ignored.
        connector.emit_last(TransportEvent::Message(
            r#"{"type":"new_order","payload":{"id":1}}"#.into(),
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // Disconnecting again is harmless.
        channel.disconnect();
        sub.unsubscribe();
    }

    #[tokio::test]
    async fn test_subscribe_typed_skips_mismatched_payloads() {
        let connector = Arc::new(ScriptedConnector::default());
        let channel = channel_with(connector.clone(), Some("jwt"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            channel.subscribe_typed("order_status_update", move |order: crate::events::OrderStatusPayload| {
                seen.lock().unwrap().push(order.status);
            })
        };
        connector.emit_last(TransportEvent::Opened);
        connector.emit_last(TransportEvent::Message(
            r#"{"type":"order_status_update","payload":{"unexpected":true}}"#.into(),
        ));
        connector.emit_last(TransportEvent::Message(
            r#"{"type":"order_status_update","payload":{"id":7,"status":"ready"}}"#.into(),
        ));
        assert_eq!(*seen.lock().unwrap(), vec!["ready".to_string()]);
    }

    #[tokio::test]
    async fn test_dropping_last_handle_closes_transport() {
        let connector = Arc::new(ScriptedConnector::default());
        let channel = channel_with(connector.clone(), Some("jwt"));
        channel.connect();
        connector.emit_last(TransportEvent::Opened);
        drop(channel);
        assert_eq!(connector.closes.load(Ordering::SeqCst), 1);
    }
}
