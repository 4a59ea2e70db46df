//! JSON envelopes exchanged with subscribers over the fan-out connection.
//!
//! Outbound (`Envelope`) and inbound (`ControlMessage`) schemas match the
//! reference `WebSocketManager` byte-for-byte: same `type` tags, same field
//! names, same nesting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cinet_proto::GpsAccuracy;

use crate::position::Position;

/// A position update's nested `data` object.
#[derive(Debug, Clone, Serialize)]
pub struct PositionData {
    /// RFC 3339 GPS fix timestamp.
    pub timestamp: DateTime<Utc>,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude; always 0 for this wire format.
    pub altitude: i32,
    /// Speed, as sent on the wire.
    pub speed: f64,
    /// Heading in degrees, or `null` if reported invalid.
    pub heading: Option<f64>,
    /// Number of satellites used in the fix.
    pub satellites: u8,
    /// Horizontal dilution of precision.
    pub hdop: f64,
    /// Battery level, percent.
    pub battery: u8,
    /// Whether the device's motion flag is set.
    pub is_moving: bool,
    /// Whether the device reports a valid GPS fix.
    pub gps_valid: bool,
}

impl From<&Position> for PositionData {
    fn from(position: &Position) -> Self {
        Self {
            timestamp: position.timestamp,
            latitude: position.latitude,
            longitude: position.longitude,
            altitude: position.altitude,
            speed: position.speed,
            heading: position.heading,
            satellites: position.satellites,
            hdop: position.hdop,
            battery: position.battery,
            is_moving: position.motion > 0,
            gps_valid: !matches!(position.gps_accuracy, GpsAccuracy::NoFix),
        }
    }
}

/// Messages the subscription hub sends to subscriber sinks.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// A new position for a device the sink is subscribed to.
    #[serde(rename = "position")]
    Position {
        /// Persistence-layer device id.
        device_id: i64,
        /// The decoded fields, nested under `data`.
        data: PositionData,
    },
    /// An alert for a device the sink is subscribed to.
    #[serde(rename = "alert")]
    Alert {
        /// Persistence-layer device id.
        device_id: i64,
        /// Alert category label.
        alert_type: String,
        /// Human-readable alert message.
        message: String,
        /// When the alert was raised.
        timestamp: DateTime<Utc>,
    },
    /// A human user's location, broadcast to every connected sink
    /// regardless of subscription.
    #[serde(rename = "user_location")]
    UserLocation {
        /// User id.
        user_id: i64,
        /// User display name.
        user_name: String,
        /// User email.
        user_email: String,
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
        /// Reported accuracy, in meters.
        accuracy: f64,
        /// When the location was reported.
        timestamp: DateTime<Utc>,
    },
    /// Acknowledges a `subscribe` control message.
    #[serde(rename = "subscribed")]
    Subscribed {
        /// Device ids the sink is now subscribed to (including ones it was
        /// already subscribed to).
        device_ids: Vec<i64>,
    },
    /// Acknowledges an `unsubscribe` control message.
    #[serde(rename = "unsubscribed")]
    Unsubscribed {
        /// Device ids the sink is no longer subscribed to.
        device_ids: Vec<i64>,
    },
    /// Acknowledges a `ping` control message.
    #[serde(rename = "pong")]
    Pong,
}

/// Control messages a subscriber sends to the hub.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Subscribe to updates for the listed devices.
    #[serde(rename = "subscribe")]
    Subscribe {
        /// Device ids to subscribe to.
        #[serde(default)]
        device_ids: Vec<i64>,
    },
    /// Unsubscribe from updates for the listed devices.
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        /// Device ids to unsubscribe from.
        #[serde(default)]
        device_ids: Vec<i64>,
    },
    /// Liveness check; answered with `Envelope::Pong`.
    #[serde(rename = "ping")]
    Ping,
}
