//! Per-connection frame dispatch.
//!
//! Each connection gets its own read buffer and its own async task. Frames
//! are fixed-length, so framing never needs to resynchronize: a malformed
//! frame is simply dropped and the next 149-byte chunk is tried, matching
//! the reference protocol handler's `while len(buffer) >= MSG_LENGTH` loop.
//! Dispatch (lookup, decrypt, persist, publish) runs serially within a
//! connection; there is no cross-connection ordering guarantee.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use cinet_core::{CipherCache, IngestError, Persistence, Position};
use cinet_proto::{FRAME_LEN, FrameError, extract_device_key, parse};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::{debug, error, warn};

use crate::hub::SubscriptionHub;

const READ_CHUNK_SIZE: usize = 4096;

/// Reads from `socket` until it closes, dispatching every complete
/// 149-byte frame as it accumulates.
pub async fn handle_connection<P: Persistence>(
    mut socket: TcpStream,
    peer: SocketAddr,
    persistence: Arc<P>,
    cipher_cache: Arc<CipherCache>,
    hub: Arc<SubscriptionHub>,
) {
    let mut buffer = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let read = match socket.read(&mut chunk).await {
            Ok(0) => {
                debug!(%peer, "connection closed by peer");
                return;
            }
            Ok(n) => n,
            Err(err) => {
                debug!(%peer, error = %err, "read error, closing connection");
                return;
            }
        };
        buffer.extend_from_slice(&chunk[..read]);

        while buffer.len() >= FRAME_LEN {
            let frame = buffer.split_to(FRAME_LEN);
            if let Err(err) = dispatch_frame(&frame, &persistence, &cipher_cache, &hub).await {
                log_ingest_error(peer, &err);
            }
        }
    }
}

async fn dispatch_frame<P: Persistence>(
    frame: &[u8],
    persistence: &Arc<P>,
    cipher_cache: &Arc<CipherCache>,
    hub: &Arc<SubscriptionHub>,
) -> Result<(), IngestError> {
    let device_key = extract_device_key(frame)?;

    let device = persistence
        .find_device_by_key(device_key)
        .await
        .map_err(|err| IngestError::PersistenceFailed(err.to_string()))?
        .ok_or(IngestError::UnknownDevice(device_key))?;

    if !device.enabled {
        return Err(IngestError::DeviceDisabled(device_key));
    }

    let cipher = cipher_cache.get(&device.passphrase);
    let event = parse(frame, &cipher)?;
    let position = Position::from_parsed_event(device.id, event);
    let device_id = position.device_id;
    let timestamp = position.timestamp;

    persistence
        .insert_position(position.clone())
        .await
        .map_err(|err| IngestError::PersistenceFailed(err.to_string()))?;

    if let Err(err) = persistence.touch_device_last_seen(device_id, timestamp).await {
        // The position is already durable; a failed timestamp touch is
        // logged but does not roll back the ingestion.
        error!(device_id, error = %err, "failed to update device last_seen_at");
    }

    hub.publish_position(device_id, &position);
    Ok(())
}

fn log_ingest_error(peer: SocketAddr, err: &IngestError) {
    match err {
        IngestError::Frame(FrameError::BadHeader) => {
            debug!(%peer, "dropping frame: bad header");
        }
        IngestError::Frame(FrameError::Truncated { .. }) => {
            debug!(%peer, "dropping frame: truncated");
        }
        IngestError::Frame(FrameError::BadOuterCrc) => {
            debug!(%peer, "dropping frame: outer CRC mismatch");
        }
        IngestError::Frame(FrameError::BadInnerCrc) => {
            warn!(%peer, "dropping frame: inner CRC mismatch (wrong passphrase?)");
        }
        IngestError::UnknownDevice(device_key) => {
            warn!(%peer, device_key = format!("{device_key:#010x}"), "unknown device key");
        }
        IngestError::DeviceDisabled(device_key) => {
            debug!(%peer, device_key = format!("{device_key:#010x}"), "device disabled");
        }
        IngestError::PersistenceFailed(message) => {
            error!(%peer, %message, "persistence failed");
        }
    }
}
