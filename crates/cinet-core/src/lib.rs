//! Device/position data model, persistence port, and cipher cache for the
//! ciNet ingestion core.
//!
//! Sits between the pure wire codec (`cinet-proto`) and the I/O-bound server
//! (`cinet-server`): this crate knows about devices and persistence, but
//! nothing about sockets.

pub mod cipher_cache;
pub mod device;
pub mod envelope;
pub mod error;
pub mod persistence;
pub mod position;

pub use cipher_cache::CipherCache;
pub use device::Device;
pub use envelope::{ControlMessage, Envelope, PositionData};
pub use error::IngestError;
pub use persistence::{Persistence, PersistenceError};
pub use position::Position;
