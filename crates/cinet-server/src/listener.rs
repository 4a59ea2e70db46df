//! The ciNet ingest listener: accepts beacon connections and attaches a
//! fresh [`handle_connection`](crate::connection::handle_connection) task to
//! each one.
//!
//! Shutdown is cooperative: once `shutdown` resolves, the accept loop stops
//! taking new connections but does not touch handlers already spawned —
//! they drain on their own when the peer closes the socket, matching the
//! teacher's QUIC accept loop in spirit (`Server::run`'s `loop { accept ...
//! }`) with a graceful-stop signal swapped in for the TCP transport.

use std::net::SocketAddr;
use std::sync::Arc;

use cinet_core::{CipherCache, Persistence};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::connection::handle_connection;
use crate::error::ServerError;
use crate::hub::SubscriptionHub;

/// Binds `bind_addr` and accepts ciNet beacon connections until `shutdown`
/// resolves.
///
/// Each accepted connection is spawned as its own task; `listen` itself
/// never blocks on a single connection's lifetime.
pub async fn listen<P: Persistence>(
    bind_addr: SocketAddr,
    persistence: Arc<P>,
    cipher_cache: Arc<CipherCache>,
    hub: Arc<SubscriptionHub>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind_addr).await.map_err(|source| ServerError::Bind {
        address: bind_addr.to_string(),
        source,
    })?;
    info!(%bind_addr, "ciNet ingest listener bound");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("ingest listener shutting down, no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        info!(%peer, "accepted ciNet connection");
                        let persistence = Arc::clone(&persistence);
                        let cipher_cache = Arc::clone(&cipher_cache);
                        let hub = Arc::clone(&hub);
                        tokio::spawn(async move {
                            handle_connection(socket, peer, persistence, cipher_cache, hub).await;
                        });
                    }
                    Err(source) => {
                        error!(error = %source, "failed to accept ciNet connection");
                        return Err(ServerError::Accept(source));
                    }
                }
            }
        }
    }
}
