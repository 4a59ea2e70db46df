//! In-memory `Persistence` implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinet_core::{Device, Persistence, PersistenceError, Position};

struct Inner {
    devices: HashMap<i64, Device>,
    device_ids_by_key: HashMap<u32, i64>,
    positions: Vec<Position>,
    next_id: i64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            devices: HashMap::new(),
            device_ids_by_key: HashMap::new(),
            positions: Vec::new(),
            next_id: 1,
        }
    }
}

/// An in-memory, process-local `Persistence` backend.
///
/// Devices must be seeded with [`MemoryPersistence::seed_device`] before any
/// frames referencing them will be accepted; there is no device-provisioning
/// API on the wire protocol itself.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryPersistence {
    /// Creates an empty backend with no devices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device and returns its assigned persistence id.
    #[allow(clippy::expect_used)] // Only poisoned if a prior holder panicked mid-update.
    pub fn seed_device(
        &self,
        device_key: u32,
        serial_number: impl Into<String>,
        passphrase: impl Into<String>,
        enabled: bool,
    ) -> i64 {
        let mut inner = self.inner.lock().expect("memory persistence lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        inner.devices.insert(
            id,
            Device {
                id,
                device_key,
                serial_number: serial_number.into(),
                passphrase: passphrase.into(),
                enabled,
                last_seen_at: None,
            },
        );
        inner.device_ids_by_key.insert(device_key, id);
        id
    }

    /// Snapshot of every position inserted so far, in insertion order.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        self.inner
            .lock()
            .expect("memory persistence lock poisoned")
            .positions
            .clone()
    }

    /// Current state of a device by its persistence id.
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn device_by_id(&self, id: i64) -> Option<Device> {
        self.inner
            .lock()
            .expect("memory persistence lock poisoned")
            .devices
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    #[allow(clippy::expect_used)]
    async fn find_device_by_key(&self, device_key: u32) -> Result<Option<Device>, PersistenceError> {
        let inner = self.inner.lock().expect("memory persistence lock poisoned");
        Ok(inner
            .device_ids_by_key
            .get(&device_key)
            .and_then(|id| inner.devices.get(id))
            .cloned())
    }

    #[allow(clippy::expect_used)]
    async fn insert_position(&self, position: Position) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock().expect("memory persistence lock poisoned");
        inner.positions.push(position);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    async fn touch_device_last_seen(
        &self,
        device_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock().expect("memory persistence lock poisoned");
        if let Some(device) = inner.devices.get_mut(&device_id) {
            device.last_seen_at = Some(at);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryPersistence;
    use chrono::Utc;
    use cinet_core::{Persistence, Position};

    fn sample_position(device_id: i64) -> Position {
        Position {
            device_id,
            timestamp: Utc::now(),
            latitude: 51.5,
            longitude: -0.1,
            altitude: 0,
            speed: 0.0,
            heading: None,
            satellites: 6,
            hdop: 0.8,
            battery: 90,
            temperature: 20,
            rssi: -70,
            motion: 0,
            status_flags: 0,
            lac: 0,
            cell_id: 0,
            operator: String::new(),
            fw_version: "1.0.0".to_string(),
            beacon_mode: 0,
            input_state: 0,
            output_state: 0,
            geozone: 0,
            alerts: 0,
            gps_accuracy: cinet_proto::GpsAccuracy::High,
            message_type: cinet_proto::MessageType::Position,
            sequence: 1,
            packet_number: 1,
            raw_data: bytes::Bytes::new(),
        }
    }

    #[tokio::test]
    async fn unknown_device_key_returns_none() {
        let storage = MemoryPersistence::new();
        let found = storage.find_device_by_key(0xDEAD_BEEF).await.expect("no error");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn seeded_device_is_found_by_key() {
        let storage = MemoryPersistence::new();
        let id = storage.seed_device(0x06EA_83A3, "SER001", "fredfred", true);
        let found = storage
            .find_device_by_key(0x06EA_83A3)
            .await
            .expect("no error")
            .expect("device was seeded");
        assert_eq!(found.id, id);
        assert_eq!(found.serial_number, "SER001");
        assert!(found.enabled);
    }

    #[tokio::test]
    async fn insert_position_is_visible_in_snapshot() {
        let storage = MemoryPersistence::new();
        let id = storage.seed_device(1, "SER1", "pw", true);
        storage
            .insert_position(sample_position(id))
            .await
            .expect("no error");
        let positions = storage.positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].device_id, id);
    }

    #[tokio::test]
    async fn touch_last_seen_updates_the_device() {
        let storage = MemoryPersistence::new();
        let id = storage.seed_device(1, "SER1", "pw", true);
        let now = Utc::now();
        storage.touch_device_last_seen(id, now).await.expect("no error");
        let device = storage.device_by_id(id).expect("device exists");
        assert_eq!(device.last_seen_at, Some(now));
    }

    #[tokio::test]
    async fn touch_last_seen_on_unknown_device_is_a_no_op() {
        let storage = MemoryPersistence::new();
        storage
            .touch_device_last_seen(999, Utc::now())
            .await
            .expect("no error");
    }
}
