//! Crate-wide error type for the device-lookup and persistence layer.

use cinet_proto::FrameError;
use thiserror::Error;

/// Everything that can go wrong turning raw frame bytes into a persisted,
/// fanned-out position.
///
/// Deliberately does not have a `TimestampInvalid` variant: an invalid
/// Datong timestamp degrades to the epoch inside the frame codec and never
/// surfaces as a rejection here.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Frame failed header validation, CRC validation, or decryption.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The frame's device key does not match any known device.
    #[error("unknown device key {0:#010x}")]
    UnknownDevice(u32),

    /// The device exists but is administratively disabled.
    #[error("device {0:#010x} is disabled")]
    DeviceDisabled(u32),

    /// The persistence backend rejected the write.
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),
}
