//! Wire format for the ciNet GPS beacon protocol.
//!
//! Pure data-in, data-out: no sockets, no async runtime. A 149-byte frame
//! goes in, a [`ParsedEvent`] comes out. This crate has no notion of devices,
//! persistence or subscribers — those live in `cinet-core`/`cinet-server`.

pub mod cipher;
pub mod crc16;
pub mod datong;
pub mod error;
pub mod frame;
pub mod header;

pub use cipher::PassphraseCipher;
pub use crc16::crc16;
pub use error::FrameError;
pub use frame::{extract_device_key, parse, GpsAccuracy, MessageType, ParsedEvent, FRAME_LEN};
pub use header::{FrameHeader, HEADER_LEN, PACKET_TYPE, START_BYTE};
