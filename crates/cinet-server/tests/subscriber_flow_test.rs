//! End-to-end subscriber test: a real TCP connection subscribing to a
//! device, then receiving a position fanned out through the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cinet_server::hub::SubscriptionHub;
use cinet_server::subscriber;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

async fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    listener.local_addr().expect("local addr")
}

fn sample_position(device_id: i64) -> cinet_core::Position {
    cinet_core::Position {
        device_id,
        timestamp: Utc::now(),
        latitude: 51.5,
        longitude: -0.1,
        altitude: 0,
        speed: 0.0,
        heading: None,
        satellites: 7,
        hdop: 0.9,
        battery: 88,
        temperature: 19,
        rssi: -65,
        motion: 0,
        status_flags: 0,
        lac: 0,
        cell_id: 0,
        operator: String::new(),
        fw_version: "1.2.3".to_string(),
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
async fn subscriber_receives_positions_for_subscribed_devices_only() {
    let addr = free_addr().await;
    let hub = Arc::new(SubscriptionHub::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(subscriber::listen(addr, Arc::clone(&hub), None, async {
        let _ = shutdown_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let socket = TcpStream::connect(addr).await.expect("connect");
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(b"{\"type\":\"subscribe\",\"device_ids\":[7]}\n")
        .await
        .expect("send subscribe");

    let mut ack = String::new();
    reader.read_line(&mut ack).await.expect("read ack");
    assert!(ack.contains("\"subscribed\""));
    assert!(ack.contains('7'));

    // Give the hub a moment to register the subscription before publishing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    hub.publish_position(99, &sample_position(99));
    hub.publish_position(7, &sample_position(7));

    let mut update = String::new();
    tokio::time::timeout(Duration::from_secs(1), reader.read_line(&mut update))
        .await
        .expect("did not time out")
        .expect("read update");
    assert!(update.contains("\"position\""));
    assert!(update.contains("\"device_id\":7"));

    let _ = shutdown_tx.send(());
    let _ = server.await;
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let addr = free_addr().await;
    let hub = Arc::new(SubscriptionHub::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(subscriber::listen(addr, Arc::clone(&hub), None, async {
        let _ = shutdown_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let socket = TcpStream::connect(addr).await.expect("connect");
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"{\"type\":\"ping\"}\n").await.expect("send ping");

    let mut reply = String::new();
    reader.read_line(&mut reply).await.expect("read pong");
    assert!(reply.contains("\"pong\""));

    let _ = shutdown_tx.send(());
    let _ = server.await;
}

#[tokio::test]
async fn a_wrong_handshake_token_is_rejected() {
    let addr = free_addr().await;
    let hub = Arc::new(SubscriptionHub::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let server = tokio::spawn(subscriber::listen(
        addr,
        Arc::clone(&hub),
        Some(Arc::from("the-real-secret")),
        async {
            let _ = shutdown_rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;

    let socket = TcpStream::connect(addr).await.expect("connect");
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    write_half
        .write_all(b"{\"token\":\"not-it\"}\n")
        .await
        .expect("send bad handshake");
    write_half.flush().await.expect("flush");

    let mut line = String::new();
    let read = reader.read_line(&mut line).await.expect("read after rejection");
    // The server closes the connection without sending anything further.
    assert_eq!(read, 0);

    let _ = shutdown_tx.send(());
    let _ = server.await;
}
