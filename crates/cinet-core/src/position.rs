//! The `Position` record: a single decoded, persisted beacon report.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use cinet_proto::{GpsAccuracy, MessageType, ParsedEvent};

/// A decoded position report, ready to be persisted and fanned out.
///
/// Built from a [`ParsedEvent`] plus the `device_id` resolved during lookup;
/// everything else is carried straight through from the decoded frame.
#[derive(Debug, Clone)]
pub struct Position {
    /// Persistence-layer id of the device this report belongs to.
    pub device_id: i64,
    /// GPS fix timestamp (inside the encrypted payload, not the header).
    pub timestamp: DateTime<Utc>,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude; always 0 for this wire format.
    pub altitude: i32,
    /// Speed, as sent on the wire.
    pub speed: f64,
    /// Heading in degrees, or `None` if reported invalid.
    pub heading: Option<f64>,
    /// Number of satellites used in the fix.
    pub satellites: u8,
    /// Horizontal dilution of precision.
    pub hdop: f64,
    /// Battery level, percent.
    pub battery: u8,
    /// Device temperature in degrees Celsius, signed.
    pub temperature: i8,
    /// Signal strength, kept signed to match the reference implementation.
    pub rssi: i32,
    /// Motion flag.
    pub motion: u8,
    /// Device status bitmap.
    pub status_flags: u16,
    /// Cellular location area code.
    pub lac: u16,
    /// Cellular cell id.
    pub cell_id: u16,
    /// Cellular operator name.
    pub operator: String,
    /// Firmware version, formatted `major.minor.patch`.
    pub fw_version: String,
    /// Beacon operating mode byte.
    pub beacon_mode: u8,
    /// Input line state byte (0 = low, nonzero = high).
    pub input_state: u8,
    /// Output line state byte (0 = closed, nonzero = open).
    pub output_state: u8,
    /// Geozone id.
    pub geozone: u8,
    /// Alert bitmap.
    pub alerts: u16,
    /// GPS accuracy bucket, derived from HDOP/fix validity.
    pub gps_accuracy: GpsAccuracy,
    /// Message type, derived from the decrypted payload's type byte.
    pub message_type: MessageType,
    /// Frame sequence number.
    pub sequence: u8,
    /// Packet number (same value as `sequence`, kept distinct to match the
    /// data model's vocabulary).
    pub packet_number: u8,
    /// The complete, unmodified 149-byte frame this position was decoded
    /// from, retained for audit/replay.
    pub raw_data: Bytes,
}

impl Position {
    /// Builds a `Position` from a decoded frame and the persistence id of
    /// the device it belongs to.
    #[must_use]
    pub fn from_parsed_event(device_id: i64, event: ParsedEvent) -> Self {
        Self {
            device_id,
            timestamp: event.timestamp,
            latitude: event.latitude,
            longitude: event.longitude,
            altitude: event.altitude,
            speed: event.speed,
            heading: event.heading,
            satellites: event.satellites,
            hdop: event.hdop,
            battery: event.battery,
            temperature: event.temperature,
            rssi: event.rssi,
            motion: event.motion,
            status_flags: event.status_flags,
            lac: event.lac,
            cell_id: event.cell_id,
            operator: event.operator,
            fw_version: event.fw_version,
            beacon_mode: event.beacon_mode,
            input_state: event.input_state,
            output_state: event.output_state,
            geozone: event.geozone,
            alerts: event.alerts,
            gps_accuracy: event.gps_accuracy,
            message_type: event.message_type,
            sequence: event.sequence,
            packet_number: event.packet_number,
            raw_data: event.raw_data,
        }
    }
}
