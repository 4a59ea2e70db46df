//! End-to-end ingest test: a real TCP connection carrying a well-formed
//! ciNet frame through the listener, the connection handler, the frame
//! codec and into persistence.

use std::net::SocketAddr;
use std::time::Duration;

use cinet_core::CipherCache;
use cinet_proto::cipher::PassphraseCipher;
use cinet_proto::crc16::crc16;
use cinet_proto::{datong, FRAME_LEN};
use cinet_server::hub::SubscriptionHub;
use cinet_server::listener;
use cinet_server::storage::MemoryPersistence;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Builds a syntactically valid, correctly CRC'd and encrypted ciNet frame.
fn build_frame(device_key: u32, sequence: u8, passphrase: &str) -> Vec<u8> {
    let mut data = vec![0u8; FRAME_LEN];
    data[0] = 0x24;
    data[1] = 0x55;
    data[4] = sequence;
    data[5..9].copy_from_slice(&device_key.to_be_bytes());
    data[9] = 0x44;
    data[22..28].copy_from_slice(b"SER777");
    data[46..51].copy_from_slice(&datong::encode(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));

    let mut payload = [0u8; 96];
    let lat_raw: i32 = (51.5074 * 60_000.0) as i32;
    let lon_raw: i32 = (-0.1278 * 60_000.0) as i32;
    payload[25..29].copy_from_slice(&lat_raw.to_be_bytes());
    payload[29..33].copy_from_slice(&lon_raw.to_be_bytes());
    payload[33..35].copy_from_slice(&0xFFFFu16.to_be_bytes());
    payload[37..42].copy_from_slice(&datong::encode(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
    payload[42..44].copy_from_slice(&100u16.to_be_bytes()); // hdop 1.00
    payload[44] = 1; // gps_valid
    payload[49] = 100; // battery

    let inner_crc = crc16(&payload[4..96]);
    let stored_inner = !inner_crc;
    payload[2] = (stored_inner & 0xFF) as u8;
    payload[3] = (stored_inner >> 8) as u8;

    let cipher = PassphraseCipher::new(passphrase);
    let encrypted = cipher.encrypt(&payload).expect("valid key");
    data[51..147].copy_from_slice(&encrypted);

    let outer_crc = crc16(&data[..147]);
    let stored_outer = !outer_crc;
    data[147] = (stored_outer & 0xFF) as u8;
    data[148] = (stored_outer >> 8) as u8;

    data
}

async fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    listener.local_addr().expect("local addr")
}

#[tokio::test]
async fn a_well_formed_frame_is_persisted_and_updates_last_seen() {
    let addr = free_addr().await;
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.seed_device(0x06EA_83A3, "SER777", "fredfred", true);
    let cipher_cache = Arc::new(CipherCache::new());
    let hub = Arc::new(SubscriptionHub::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(listener::listen(addr, Arc::clone(&persistence), cipher_cache, hub, async {
        let _ = shutdown_rx.await;
    }));

    // Give the listener a moment to bind before connecting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut socket = TcpStream::connect(addr).await.expect("connect");
    let frame = build_frame(0x06EA_83A3, 7, "fredfred");
    socket.write_all(&frame).await.expect("write frame");
    socket.shutdown().await.expect("shutdown write half");

    // Poll for the async dispatch to land.
    let mut positions = Vec::new();
    for _ in 0..50 {
        positions = persistence.positions();
        if !positions.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(positions.len(), 1);
    let position = &positions[0];
    assert!((position.latitude - 51.5074).abs() < 1e-3);
    assert!((position.longitude - (-0.1278)).abs() < 1e-3);
    assert_eq!(position.battery, 100);
    assert!(matches!(position.gps_accuracy, cinet_proto::GpsAccuracy::High));

    let device = persistence.device_by_id(position.device_id).expect("device exists");
    assert!(device.last_seen_at.is_some());

    let _ = shutdown_tx.send(());
    let _ = server.await;
}

#[tokio::test]
async fn an_unknown_device_key_is_dropped_without_persisting() {
    let addr = free_addr().await;
    let persistence = Arc::new(MemoryPersistence::new());
    let cipher_cache = Arc::new(CipherCache::new());
    let hub = Arc::new(SubscriptionHub::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(listener::listen(addr, Arc::clone(&persistence), cipher_cache, hub, async {
        let _ = shutdown_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut socket = TcpStream::connect(addr).await.expect("connect");
    let frame = build_frame(0xDEAD_BEEF, 1, "whatever");
    socket.write_all(&frame).await.expect("write frame");
    socket.shutdown().await.expect("shutdown write half");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(persistence.positions().is_empty());

    let _ = shutdown_tx.send(());
    let _ = server.await;
}

#[tokio::test]
async fn wrong_passphrase_is_rejected_at_inner_crc() {
    let addr = free_addr().await;
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.seed_device(0x06EA_83A3, "SER777", "correct-horse", true);
    let cipher_cache = Arc::new(CipherCache::new());
    let hub = Arc::new(SubscriptionHub::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(listener::listen(addr, Arc::clone(&persistence), cipher_cache, hub, async {
        let _ = shutdown_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut socket = TcpStream::connect(addr).await.expect("connect");
    // Frame encrypted with a different passphrase than the seeded device's.
    let frame = build_frame(0x06EA_83A3, 1, "battery-staple");
    socket.write_all(&frame).await.expect("write frame");
    socket.shutdown().await.expect("shutdown write half");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(persistence.positions().is_empty());

    let _ = shutdown_tx.send(());
    let _ = server.await;
}

#[tokio::test]
async fn two_frames_in_one_connection_are_both_dispatched_in_order() {
    let addr = free_addr().await;
    let persistence = Arc::new(MemoryPersistence::new());
    persistence.seed_device(0x0000_0042, "SER001", "pass", true);
    let cipher_cache = Arc::new(CipherCache::new());
    let hub = Arc::new(SubscriptionHub::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(listener::listen(addr, Arc::clone(&persistence), cipher_cache, hub, async {
        let _ = shutdown_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut socket = TcpStream::connect(addr).await.expect("connect");
    let mut both = build_frame(0x42, 1, "pass");
    both.extend(build_frame(0x42, 2, "pass"));
    socket.write_all(&both).await.expect("write two frames");
    socket.shutdown().await.expect("shutdown write half");

    let mut positions = Vec::new();
    for _ in 0..50 {
        positions = persistence.positions();
        if positions.len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].sequence, 1);
    assert_eq!(positions[1].sequence, 2);

    let _ = shutdown_tx.send(());
    let _ = server.await;
}
