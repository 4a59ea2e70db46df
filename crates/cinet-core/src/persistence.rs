//! The persistence port: the only way the ingestion core touches storage.
//!
//! Deliberately narrow — three methods, matching the connection handler's
//! three touch points with storage (lookup, append, timestamp update) rather
//! than a general-purpose repository interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::device::Device;
use crate::position::Position;

/// Errors a `Persistence` implementation can report.
///
/// Kept deliberately opaque (a message, not a structured enum): the
/// ingestion core only ever logs this at `ERROR` and moves on, per the
/// error table's `PersistenceFailed` disposition.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct PersistenceError(pub String);

impl PersistenceError {
    /// Wraps any displayable backend error.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Storage port the connection handler depends on.
///
/// Implementations must be safe to share across every connection task:
/// `find_device_by_key` and `insert_position` are called concurrently from
/// as many tasks as there are open connections.
#[async_trait]
pub trait Persistence: Send + Sync + 'static {
    /// Looks up a device by its wire-protocol device key.
    ///
    /// Returns `Ok(None)` for an unknown key; callers turn that into
    /// `IngestError::UnknownDevice`, not a persistence failure.
    async fn find_device_by_key(&self, device_key: u32) -> Result<Option<Device>, PersistenceError>;

    /// Appends a decoded position.
    async fn insert_position(&self, position: Position) -> Result<(), PersistenceError>;

    /// Updates a device's `last_seen_at` to `at`.
    ///
    /// Called once per successfully ingested frame, after the position has
    /// been inserted. Must not regress `last_seen_at` to an earlier time if
    /// frames arrive out of order relative to wall-clock ingestion time;
    /// per-connection ordering guarantees this in practice, but
    /// implementations should not assume it.
    async fn touch_device_last_seen(
        &self,
        device_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;
}
