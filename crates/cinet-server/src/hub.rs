//! Subscription hub: fans decoded positions and alerts out to subscribed
//! clients.
//!
//! Keeps a bidirectional index — `device_id -> subscriber sinks` and
//! `sink -> subscribed device_ids` — under one mutex, the same shape the
//! connection registry this was adapted from uses for session/room
//! membership. The lock is held only across map mutation; delivery to sinks
//! always happens after the snapshot is taken and the lock released, so a
//! slow or dead subscriber can never block ingestion or other subscribers.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use cinet_core::{Envelope, Position, PositionData};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised while delivering to a subscriber.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubError {
    /// The sink's channel is closed or full; the sink is detached.
    #[error("failed to send to subscriber sink")]
    SinkSendFailed,
}

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// A connected subscriber's outbound channel.
///
/// Cloning a `SubscriberSink` shares the same underlying channel and
/// identity; the hub only ever stores clones, never the original sender.
#[derive(Clone)]
pub struct SubscriberSink {
    id: u64,
    sender: mpsc::UnboundedSender<Envelope>,
}

impl SubscriberSink {
    /// Wraps a channel sender as a new, uniquely-identified sink.
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            id: NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed),
            sender,
        }
    }

    /// This sink's identity, stable for its lifetime.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pushes `envelope` directly onto this sink's channel, bypassing the
    /// hub's subscription indices. Used for per-connection replies (control
    /// acks, pongs) that do not go through `publish_*`.
    pub(crate) fn send(&self, envelope: Envelope) -> Result<(), HubError> {
        self.sender.send(envelope).map_err(|_| HubError::SinkSendFailed)
    }
}

impl PartialEq for SubscriberSink {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SubscriberSink {}

impl Hash for SubscriberSink {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Default)]
struct Inner {
    sinks: HashMap<u64, SubscriberSink>,
    subscribers_by_device: HashMap<i64, HashSet<u64>>,
    devices_by_subscriber: HashMap<u64, HashSet<i64>>,
}

/// The process-wide fan-out hub, injected into every connection handler
/// rather than reached as an ambient singleton.
#[derive(Default)]
pub struct SubscriptionHub {
    inner: Mutex<Inner>,
}

impl SubscriptionHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly connected sink with no subscriptions.
    #[allow(clippy::expect_used)]
    pub fn attach(&self, sink: SubscriberSink) {
        let mut inner = self.inner.lock().expect("subscription hub lock poisoned");
        inner.devices_by_subscriber.insert(sink.id(), HashSet::new());
        inner.sinks.insert(sink.id(), sink);
    }

    /// Removes a sink and every subscription it held.
    #[allow(clippy::expect_used)]
    pub fn detach(&self, sink_id: u64) {
        let mut inner = self.inner.lock().expect("subscription hub lock poisoned");
        inner.sinks.remove(&sink_id);
        if let Some(devices) = inner.devices_by_subscriber.remove(&sink_id) {
            for device_id in devices {
                if let Some(subscribers) = inner.subscribers_by_device.get_mut(&device_id) {
                    subscribers.remove(&sink_id);
                    if subscribers.is_empty() {
                        inner.subscribers_by_device.remove(&device_id);
                    }
                }
            }
        }
    }

    /// Subscribes `sink_id` to `device_ids`. A no-op for an unattached sink.
    #[allow(clippy::expect_used)]
    pub fn subscribe(&self, sink_id: u64, device_ids: &[i64]) {
        let mut inner = self.inner.lock().expect("subscription hub lock poisoned");
        if !inner.devices_by_subscriber.contains_key(&sink_id) {
            return;
        }
        for &device_id in device_ids {
            inner
                .subscribers_by_device
                .entry(device_id)
                .or_default()
                .insert(sink_id);
            inner
                .devices_by_subscriber
                .entry(sink_id)
                .or_default()
                .insert(device_id);
        }
    }

    /// Unsubscribes `sink_id` from `device_ids`. A no-op for an unattached
    /// sink.
    #[allow(clippy::expect_used)]
    pub fn unsubscribe(&self, sink_id: u64, device_ids: &[i64]) {
        let mut inner = self.inner.lock().expect("subscription hub lock poisoned");
        if !inner.devices_by_subscriber.contains_key(&sink_id) {
            return;
        }
        for &device_id in device_ids {
            if let Some(subscribers) = inner.subscribers_by_device.get_mut(&device_id) {
                subscribers.remove(&sink_id);
                if subscribers.is_empty() {
                    inner.subscribers_by_device.remove(&device_id);
                }
            }
            if let Some(devices) = inner.devices_by_subscriber.get_mut(&sink_id) {
                devices.remove(&device_id);
            }
        }
    }

    /// Sends a decoded position to every sink subscribed to `device_id`.
    ///
    /// Sinks whose send fails are detached; the caller is never blocked
    /// waiting on a slow subscriber beyond the channel's own send call.
    #[allow(clippy::expect_used)]
    pub fn publish_position(&self, device_id: i64, position: &Position) {
        let envelope = Envelope::Position {
            device_id,
            data: PositionData::from(position),
        };
        self.deliver_to_device(device_id, envelope);
    }

    /// Sends an alert to every sink subscribed to `device_id`.
    #[allow(clippy::expect_used)]
    pub fn publish_alert(
        &self,
        device_id: i64,
        alert_type: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        let envelope = Envelope::Alert {
            device_id,
            alert_type: alert_type.into(),
            message: message.into(),
            timestamp: at,
        };
        self.deliver_to_device(device_id, envelope);
    }

    /// Sends `envelope` to every connected sink, regardless of subscription.
    /// Used for broadcast-style messages such as a human user's location.
    #[allow(clippy::expect_used)]
    pub fn publish_broadcast(&self, envelope: Envelope) {
        let sinks: Vec<SubscriberSink> = {
            let inner = self.inner.lock().expect("subscription hub lock poisoned");
            inner.sinks.values().cloned().collect()
        };
        self.deliver(sinks, envelope);
    }

    #[allow(clippy::expect_used)]
    fn deliver_to_device(&self, device_id: i64, envelope: Envelope) {
        let sinks: Vec<SubscriberSink> = {
            let inner = self.inner.lock().expect("subscription hub lock poisoned");
            let Some(subscriber_ids) = inner.subscribers_by_device.get(&device_id) else {
                return;
            };
            subscriber_ids
                .iter()
                .filter_map(|id| inner.sinks.get(id).cloned())
                .collect()
        };
        self.deliver(sinks, envelope);
    }

    fn deliver(&self, sinks: Vec<SubscriberSink>, envelope: Envelope) {
        let mut failed = Vec::new();
        for sink in sinks {
            if sink.send(envelope.clone()).is_err() {
                failed.push(sink.id());
            }
        }
        for sink_id in failed {
            self.detach(sink_id);
        }
    }
}
