//! The subscriber fan-out listener.
//!
//! Exposes [`SubscriptionHub`] to the network: each accepted TCP connection
//! becomes one [`SubscriberSink`], line-delimited JSON in both directions.
//! The wire schema (`Envelope`/`ControlMessage`) is pinned by the
//! specification; the transport that carries it is not — the reference
//! implementation uses a `fastapi`/`websockets` stack with JWT bearer
//! tokens, which has no equivalent in the teacher's dependency set. This
//! keeps the same handshake shape (an optional bearer token, checked before
//! the connection is attached to the hub) over newline-delimited JSON
//! instead, recorded as a deliberate transport substitution in `DESIGN.md`.

use std::net::SocketAddr;
use std::sync::Arc;

use cinet_core::{ControlMessage, Envelope};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::hub::{SubscriberSink, SubscriptionHub};

/// The handshake line a subscriber must send first when an auth secret is
/// configured: `{"token": "..."}`.
#[derive(Debug, Deserialize)]
struct AuthHandshake {
    token: String,
}

/// Accepts subscriber connections on `bind_addr` until `shutdown` resolves.
pub async fn listen(
    bind_addr: SocketAddr,
    hub: Arc<SubscriptionHub>,
    auth_secret: Option<Arc<str>>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), crate::error::ServerError> {
    let listener =
        tokio::net::TcpListener::bind(bind_addr).await.map_err(|source| crate::error::ServerError::Bind {
            address: bind_addr.to_string(),
            source,
        })?;
    tracing::info!(%bind_addr, "subscriber listener bound");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!("subscriber listener shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        let hub = Arc::clone(&hub);
                        let auth_secret = auth_secret.clone();
                        tokio::spawn(async move {
                            handle_subscriber(socket, peer, hub, auth_secret).await;
                        });
                    }
                    Err(source) => {
                        tracing::error!(error = %source, "failed to accept subscriber connection");
                        return Err(crate::error::ServerError::Accept(source));
                    }
                }
            }
        }
    }
}

async fn handle_subscriber(
    socket: TcpStream,
    peer: SocketAddr,
    hub: Arc<SubscriptionHub>,
    auth_secret: Option<Arc<str>>,
) {
    let (read_half, mut write_half) = tokio::io::split(socket);
    let mut reader = BufReader::new(read_half);

    if let Some(secret) = &auth_secret {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(%peer, "subscriber closed before handshake");
                return;
            }
            Ok(_) => match serde_json::from_str::<AuthHandshake>(line.trim()) {
                Ok(handshake) if handshake.token.as_str() == secret.as_ref() => {}
                _ => {
                    warn!(%peer, "subscriber handshake rejected");
                    return;
                }
            },
            Err(err) => {
                debug!(%peer, error = %err, "subscriber handshake read failed");
                return;
            }
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    let sink = SubscriberSink::new(tx);
    hub.attach(sink.clone());
    debug!(%peer, sink_id = sink.id(), "subscriber attached");

    let writer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let Ok(mut line) = serde_json::to_string(&envelope) else {
                continue;
            };
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(%peer, error = %err, "subscriber read error");
                break;
            }
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let control: ControlMessage = match serde_json::from_str(trimmed) {
            Ok(control) => control,
            Err(err) => {
                debug!(%peer, error = %err, "malformed subscriber control message");
                continue;
            }
        };
        match control {
            ControlMessage::Subscribe { device_ids } => {
                hub.subscribe(sink.id(), &device_ids);
                let _ = sink.send(Envelope::Subscribed { device_ids });
            }
            ControlMessage::Unsubscribe { device_ids } => {
                hub.unsubscribe(sink.id(), &device_ids);
                let _ = sink.send(Envelope::Unsubscribed { device_ids });
            }
            ControlMessage::Ping => {
                let _ = sink.send(Envelope::Pong);
            }
        }
    }

    hub.detach(sink.id());
    writer.abort();
    debug!(%peer, sink_id = sink.id(), "subscriber detached");
}
