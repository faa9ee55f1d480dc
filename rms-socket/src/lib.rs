//! RMS Socket - realtime push channel for the restaurant front end.
//!
//! This crate provides the shared realtime connection that handles:
//! - Topic-based publish/subscribe over a single WebSocket
//! - Token-authenticated connects against the restaurant endpoint
//! - Automatic reconnection with bounded exponential backoff and jitter
//! - Connection status notifications for UI indicators
//! - Typed payloads for the well-known restaurant topics

pub mod backoff;
pub mod channel;
pub mod events;
pub mod registry;
pub mod transport;
pub mod ws;

// Re-export key types
pub use backoff::ReconnectConfig;
pub use channel::{build_endpoint_url, RealtimeChannel, Subscription};
pub use events::{
    ConnectionState, Envelope, OrderStatusPayload, ReservationUpdatePayload,
    TableStatusPayload, Topic,
};
pub use registry::{MessageCallback, StatusCallback};
pub use transport::{CloseInfo, Connector, EventSink, Transport, TransportEvent};
pub use ws::WsConnector;
