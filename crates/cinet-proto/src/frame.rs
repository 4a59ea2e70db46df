//! ciNet frame parsing: a 149-byte wire frame in, a [`ParsedEvent`] out.
//!
//! The frame is a 51-byte cleartext header ([`FrameHeader`]), a 96-byte
//! Blowfish/ECB-encrypted payload, and a 2-byte outer CRC-16. The passphrase
//! needed to decrypt the payload is only known after the device key in the
//! header has been looked up, so parsing is staged: [`extract_device_key`]
//! reads just the header, and [`parse`] takes the already-resolved cipher.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::cipher::PassphraseCipher;
use crate::crc16::crc16;
use crate::datong;
use crate::error::FrameError;
use crate::header::{FrameHeader, HEADER_LEN};

/// Total length in bytes of a ciNet frame.
pub const FRAME_LEN: usize = 149;

const ENCRYPTED_OFFSET: usize = HEADER_LEN;
const ENCRYPTED_LEN: usize = 96;
const OUTER_CRC_OFFSET: usize = 147;
const OUTER_CRC_COVERED_LEN: usize = 147;

const INNER_CRC_COVERED_OFFSET: usize = 4;
const INNER_CRC_COVERED_LEN: usize = 92;

/// GPS fix quality, derived from HDOP per the reference thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsAccuracy {
    /// `gps_valid` was false; no fix at all.
    NoFix,
    /// HDOP <= 1.0.
    High,
    /// HDOP <= 2.0.
    Medium,
    /// HDOP <= 5.0.
    Low,
    /// HDOP > 5.0.
    Poor,
}

/// The decrypted payload's message-type byte, decoded to a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Routine position report (byte value 0, and the fallback for unknown values).
    Position,
    /// Status report (byte value 1).
    Status,
    /// GSM/cellular report (byte value 2).
    Gsm,
    /// Diagnostic report (byte value 3).
    Diagnostic,
}

impl MessageType {
    fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Status,
            2 => Self::Gsm,
            3 => Self::Diagnostic,
            _ => Self::Position,
        }
    }
}

/// A fully decoded ciNet frame: everything the persistence layer and the
/// subscription hub need, with no further reference back to the raw bytes
/// except [`ParsedEvent::raw_data`].
#[derive(Debug, Clone)]
pub struct ParsedEvent {
    /// Device key taken from the cleartext header.
    pub device_key: u32,
    /// Device serial number from the cleartext header.
    pub serial_number: String,
    /// Source type string from the cleartext header.
    pub source_type: String,
    /// Frame sequence number from the cleartext header; also used as the
    /// decoded event's packet number.
    pub sequence: u8,
    /// Datong timestamp carried in the cleartext header (distinct from the
    /// GPS fix timestamp inside the encrypted payload).
    pub header_timestamp: DateTime<Utc>,
    /// Client/device name from the decrypted payload.
    pub client_name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude; always 0, this wire format does not carry altitude.
    pub altitude: i32,
    /// Speed, as sent on the wire (no documented unit conversion).
    pub speed: f64,
    /// Heading in degrees, or `None` if the device reported it as invalid
    /// (raw value `0xFFFF`).
    pub heading: Option<f64>,
    /// GPS fix timestamp.
    pub timestamp: DateTime<Utc>,
    /// Number of satellites used in the fix.
    pub satellites: u8,
    /// Horizontal dilution of precision.
    pub hdop: f64,
    /// Whether the device reports a valid GPS fix.
    pub gps_valid: bool,
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
    /// Alarm byte.
    pub alarm: u8,
    /// Beacon mode byte.
    pub beacon_mode: u8,
    /// Motion sensitivity setting.
    pub motion_sensitivity: u8,
    /// Output state byte (0 = closed, nonzero = open).
    pub output_state: u8,
    /// Input state byte (0 = low, nonzero = high).
    pub input_state: u8,
    /// Geozone id.
    pub geozone: u8,
    /// Alert bitmap.
    pub alerts: u16,
    /// Firmware version, formatted `major.minor.patch`.
    pub fw_version: String,
    /// GSM bit error rate.
    pub bit_error_rate: i32,
    /// GPS accuracy bucket, derived from `hdop`/`gps_valid`.
    pub gps_accuracy: GpsAccuracy,
    /// Whether the device's wake trigger indicates an input-triggered report.
    pub input_triggered: bool,
    /// Message type, derived from the decrypted payload's type byte.
    pub message_type: MessageType,
    /// Same value as `sequence`, named separately to match the data model's
    /// vocabulary for the persisted position row.
    pub packet_number: u8,
    /// The complete, unmodified 149-byte frame.
    pub raw_data: Bytes,
}

/// Reads just the device key out of a frame's cleartext header.
///
/// Used before the passphrase (and therefore the cipher) is known. Does not
/// validate the outer CRC or decrypt anything.
pub fn extract_device_key(data: &[u8]) -> Result<u32, FrameError> {
    if data.len() < FRAME_LEN {
        return Err(FrameError::Truncated {
            expected: FRAME_LEN,
            actual: data.len(),
        });
    }
    let header = FrameHeader::parse(data).ok_or(FrameError::BadHeader)?;
    if !header.is_valid() {
        return Err(FrameError::BadHeader);
    }
    Ok(header.device_key())
}

/// Parses a complete 149-byte ciNet frame, decrypting its payload with
/// `cipher`.
///
/// The declared-length field at header offset 2 is read but never checked
/// against the actual frame length, matching the reference implementation.
pub fn parse(data: &[u8], cipher: &PassphraseCipher) -> Result<ParsedEvent, FrameError> {
    if data.len() < FRAME_LEN {
        return Err(FrameError::Truncated {
            expected: FRAME_LEN,
            actual: data.len(),
        });
    }
    let data = &data[..FRAME_LEN];

    let header = FrameHeader::parse(data).ok_or(FrameError::BadHeader)?;
    if !header.is_valid() {
        return Err(FrameError::BadHeader);
    }

    let calculated_outer = crc16(&data[..OUTER_CRC_COVERED_LEN]);
    let stored_outer = u16::from_le_bytes([data[OUTER_CRC_OFFSET], data[OUTER_CRC_OFFSET + 1]]);
    if !calculated_outer != stored_outer {
        return Err(FrameError::BadOuterCrc);
    }

    let encrypted = &data[ENCRYPTED_OFFSET..ENCRYPTED_OFFSET + ENCRYPTED_LEN];
    let decrypted = cipher.decrypt(encrypted).ok_or(FrameError::BadInnerCrc)?;
    if decrypted.len() != ENCRYPTED_LEN {
        return Err(FrameError::BadInnerCrc);
    }

    let calculated_inner = crc16(
        &decrypted[INNER_CRC_COVERED_OFFSET..INNER_CRC_COVERED_OFFSET + INNER_CRC_COVERED_LEN],
    );
    let stored_inner = u16::from_le_bytes([decrypted[2], decrypted[3]]);
    if !calculated_inner != stored_inner {
        return Err(FrameError::BadInnerCrc);
    }

    Ok(decode_payload(&header, &decrypted, data))
}

fn decode_payload(header: &FrameHeader, decrypted: &[u8], raw: &[u8]) -> ParsedEvent {
    let message_type_byte = decrypted[4];
    let client_name = decode_padded_ascii(&decrypted[5..25]);

    let lat_raw = i32::from_be_bytes(decrypted[25..29].try_into().unwrap_or_default());
    let lon_raw = i32::from_be_bytes(decrypted[29..33].try_into().unwrap_or_default());
    let latitude = f64::from(lat_raw) / 60_000.0;
    let longitude = f64::from(lon_raw) / 60_000.0;

    let heading_raw = u16::from_be_bytes(decrypted[33..35].try_into().unwrap_or_default());
    let heading = (heading_raw != 0xFFFF).then(|| f64::from(heading_raw) / 100.0);

    let speed = f64::from(u16::from_be_bytes(
        decrypted[35..37].try_into().unwrap_or_default(),
    ));

    let gps_timestamp_bytes: [u8; 5] = decrypted[37..42].try_into().unwrap_or_default();
    let timestamp = datong::decode(&gps_timestamp_bytes);

    let hdop = f64::from(u16::from_be_bytes(
        decrypted[42..44].try_into().unwrap_or_default(),
    )) / 100.0;

    let gps_valid = decrypted[44] == 1;
    let motion = decrypted[45];
    let alarm = decrypted[46];
    // decrypted[47..49] is a device-family length field; no further fields
    // depend on it in this wire format revision.
    let battery = decrypted[49];
    let temperature = decrypted[50] as i8;
    let satellites = decrypted[51];
    let rssi = i32::from_be_bytes(decrypted[52..56].try_into().unwrap_or_default());
    let bit_error_rate = i32::from_be_bytes(decrypted[56..60].try_into().unwrap_or_default());
    let status_flags = u16::from_be_bytes(decrypted[60..62].try_into().unwrap_or_default());
    let lac = u16::from_be_bytes(decrypted[62..64].try_into().unwrap_or_default());
    let cell_id = u16::from_be_bytes(decrypted[64..66].try_into().unwrap_or_default());
    // decrypted[66..68] is the access-technology field, not carried into the
    // data model (no consumer reads it downstream).
    let operator = decode_padded_ascii(&decrypted[68..76]);

    let fw_version = format!("{}.{}.{}", decrypted[76], decrypted[77], decrypted[78]);

    let beacon_mode = decrypted[87];
    let motion_sensitivity = decrypted[88];
    let wake_trigger = decrypted[89];
    let output_state = decrypted[90];
    let geozone = decrypted[91];
    let input_state = decrypted[92];
    let alerts = u16::from_be_bytes(decrypted[93..95].try_into().unwrap_or_default());

    let gps_accuracy = if !gps_valid {
        GpsAccuracy::NoFix
    } else if hdop <= 1.0 {
        GpsAccuracy::High
    } else if hdop <= 2.0 {
        GpsAccuracy::Medium
    } else if hdop <= 5.0 {
        GpsAccuracy::Low
    } else {
        GpsAccuracy::Poor
    };

    ParsedEvent {
        device_key: header.device_key(),
        serial_number: header.serial_number(),
        source_type: header.source_type(),
        sequence: header.sequence(),
        header_timestamp: datong::decode(&header.timestamp_bytes()),
        client_name,
        latitude,
        longitude,
        altitude: 0,
        speed,
        heading,
        timestamp,
        satellites,
        hdop,
        gps_valid,
        battery,
        temperature,
        rssi,
        motion,
        status_flags,
        lac,
        cell_id,
        operator,
        alarm,
        beacon_mode,
        motion_sensitivity,
        output_state,
        input_state,
        geozone,
        alerts,
        fw_version,
        bit_error_rate,
        gps_accuracy,
        input_triggered: wake_trigger == 1,
        message_type: MessageType::from_byte(message_type_byte),
        packet_number: header.sequence(),
        raw_data: Bytes::copy_from_slice(raw),
    }
}

fn decode_padded_ascii(field: &[u8]) -> String {
    let trimmed = field
        .iter()
        .position(|&b| b == 0)
        .map_or(field, |end| &field[..end]);
    String::from_utf8_lossy(trimmed).into_owned()
}
