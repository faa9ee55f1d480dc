//! Wire envelope, topic catalogue and connection state.
//!
//! Every frame on the push channel is a JSON text frame of the form
//! `{"type": "<topic>", "payload": <json>}` in both directions. Topics are
//! free-form strings; [`Topic`] only names the ones the restaurant backend
//! is known to publish so callers do not scatter string literals around.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use rms_core::error::RmsResult;

/// Topics published by the restaurant backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// An order moved through the kitchen workflow (`order_status_update`).
    OrderStatusUpdate,
    /// A table changed status or current order (`table_status_update`).
    TableStatusUpdate,
    /// A new order was placed (`new_order`).
    NewOrder,
    /// A reservation was created, changed or cancelled (`reservation_update`).
    ReservationUpdate,
    /// Bulk order list changes (`order_updates`).
    OrderUpdates,
    /// Menu availability changes pushed by the kitchen (`kitchen_menu_updates`).
    KitchenMenuUpdates,
    /// Any other topic string.
    Other(String),
}

impl Topic {
    /// Parse a topic string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "order_status_update" => Self::OrderStatusUpdate,
            "table_status_update" => Self::TableStatusUpdate,
            "new_order" => Self::NewOrder,
            "reservation_update" => Self::ReservationUpdate,
            "order_updates" => Self::OrderUpdates,
            "kitchen_menu_updates" => Self::KitchenMenuUpdates,
            other => Self::Other(other.to_string()),
        }
    }

    /// The routing key used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::OrderStatusUpdate => "order_status_update",
            Self::TableStatusUpdate => "table_status_update",
            Self::NewOrder => "new_order",
            Self::ReservationUpdate => "reservation_update",
            Self::OrderUpdates => "order_updates",
            Self::KitchenMenuUpdates => "kitchen_menu_updates",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Whether this topic carries order traffic.
    pub fn is_order_topic(&self) -> bool {
        matches!(
            self,
            Self::OrderStatusUpdate | Self::NewOrder | Self::OrderUpdates
        )
    }

    /// Whether this topic affects table occupancy.
    pub fn is_table_topic(&self) -> bool {
        matches!(self, Self::TableStatusUpdate | Self::ReservationUpdate)
    }

    /// All well-known topic strings.
    pub fn all_topic_names() -> &'static [&'static str] {
        &[
            "order_status_update",
            "table_status_update",
            "new_order",
            "reservation_update",
            "order_updates",
            "kitchen_menu_updates",
        ]
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.as_str().to_string()
    }
}

/// Payload of `order_status_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusPayload {
    pub id: i64,
    pub status: String,
}

/// Payload of `table_status_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStatusPayload {
    pub id: i64,
    pub status: String,
    /// Order currently seated at the table, if any.
    #[serde(default)]
    pub current_order: Option<serde_json::Value>,
}

/// Payload of `reservation_update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationUpdatePayload {
    #[serde(default)]
    pub table_id: Option<i64>,
    /// Whether the table should be shown as reserved.
    #[serde(default)]
    pub affects_status: bool,
}

/// The wire unit exchanged over the realtime connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Routing key.
    #[serde(rename = "type")]
    pub topic: String,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Serialize into a JSON text frame.
    pub fn encode(&self) -> RmsResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON text frame.
    pub fn decode(text: &str) -> RmsResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The topic as a [`Topic`].
    pub fn topic(&self) -> Topic {
        Topic::from_str(&self.topic)
    }

    fn payload_as<T: DeserializeOwned>(&self, expected: Topic) -> Option<T> {
        if self.topic() == expected {
            serde_json::from_value(self.payload.clone()).ok()
        } else {
            None
        }
    }

    /// Try to parse the payload as an [`OrderStatusPayload`].
    pub fn as_order_status(&self) -> Option<OrderStatusPayload> {
        self.payload_as(Topic::OrderStatusUpdate)
    }

    /// Try to parse the payload as a [`TableStatusPayload`].
    pub fn as_table_status(&self) -> Option<TableStatusPayload> {
        self.payload_as(Topic::TableStatusUpdate)
    }

    /// Try to parse the payload as a [`ReservationUpdatePayload`].
    pub fn as_reservation_update(&self) -> Option<ReservationUpdatePayload> {
        self.payload_as(Topic::ReservationUpdate)
    }
}

/// Lifecycle state of the underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport exists.
    Absent,
    /// The open request was issued; waiting for the transport.
    Connecting,
    /// Open and exchanging frames.
    Open,
    /// The transport reported an error; waiting for it to close.
    Closing,
}

impl ConnectionState {
    /// Whether a new connect request must be ignored in this state.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
        }
    }
}
