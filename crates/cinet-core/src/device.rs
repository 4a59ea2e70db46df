//! The `Device` record: a provisioned beacon and its decryption passphrase.

use chrono::{DateTime, Utc};

/// A provisioned GPS beacon.
///
/// `device_key` is the value carried in every frame's cleartext header and
/// must be globally unique; it is the only key the ingestion path has to
/// look a device up by.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Opaque identifier used by the persistence backend (primary key).
    pub id: i64,
    /// The 4-byte device key sent in every frame's header.
    pub device_key: u32,
    /// Manufacturer serial number.
    pub serial_number: String,
    /// Blowfish passphrase used to decrypt this device's frames.
    pub passphrase: String,
    /// Whether this device is allowed to have its frames persisted and
    /// fanned out. Disabled devices are looked up successfully but rejected.
    pub enabled: bool,
    /// The last time a frame from this device was successfully ingested.
    pub last_seen_at: Option<DateTime<Utc>>,
}
