//! ciNet ingestion server.
//!
//! Wires the pure wire codec (`cinet-proto`) and the device/persistence data
//! model (`cinet-core`) to real I/O: a TCP listener for beacon frames, an
//! in-memory `Persistence` backend for local runs and tests, and a
//! subscriber fan-out listener built on the in-process [`SubscriptionHub`].
//!
//! # Components
//!
//! - [`listener::listen`]: the ciNet ingest accept loop (§4.7 of the design
//!   notes)
//! - [`connection::handle_connection`]: per-connection framing and dispatch
//!   (§4.6)
//! - [`hub::SubscriptionHub`]: the subscribe/publish fan-out index (§4.8)
//! - [`subscriber::listen`]: the network transport that exposes the hub to
//!   real subscriber connections
//! - [`storage::MemoryPersistence`]: the reference `Persistence`
//!   implementation used by the binary and the test suite

pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod listener;
pub mod storage;
pub mod subscriber;

use std::sync::Arc;

use cinet_core::CipherCache;
pub use config::Config;
pub use error::ServerError;
pub use hub::{HubError, SubscriberSink, SubscriptionHub};
use storage::MemoryPersistence;
use tokio::signal;
use tracing::info;

/// Runs the ingest listener and the subscriber listener side by side until
/// ctrl-c is received, using an in-memory persistence backend.
///
/// Returns the backend so a caller (tests, or a future real-backend
/// wrapper) can inspect what was ingested after shutdown.
pub async fn run(config: Config) -> Result<MemoryPersistence, ServerError> {
    let persistence = Arc::new(MemoryPersistence::new());
    let cipher_cache = Arc::new(CipherCache::new());
    let hub = Arc::new(SubscriptionHub::new());

    let ingest_addr = config.ingest_bind()?;
    let subscriber_addr = config.subscriber_bind()?;
    let auth_secret = config.auth_secret.clone().map(Arc::<str>::from);

    info!(%ingest_addr, %subscriber_addr, "starting ciNet ingestion server");

    let (ingest_shutdown_tx, ingest_shutdown_rx) = tokio::sync::oneshot::channel();
    let (sub_shutdown_tx, sub_shutdown_rx) = tokio::sync::oneshot::channel();

    let ingest_task = tokio::spawn(listener::listen(
        ingest_addr,
        Arc::clone(&persistence),
        cipher_cache,
        Arc::clone(&hub),
        async {
            let _ = ingest_shutdown_rx.await;
        },
    ));
    let subscriber_task = tokio::spawn(subscriber::listen(subscriber_addr, hub, auth_secret, async {
        let _ = sub_shutdown_rx.await;
    }));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining listeners");
    let _ = ingest_shutdown_tx.send(());
    let _ = sub_shutdown_tx.send(());

    let ingest_result = ingest_task.await.map_err(|err| ServerError::Config(err.to_string()))?;
    let subscriber_result = subscriber_task.await.map_err(|err| ServerError::Config(err.to_string()))?;
    ingest_result?;
    subscriber_result?;

    Ok(Arc::try_unwrap(persistence).unwrap_or_else(|arc| (*arc).clone()))
}

async fn wait_for_shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => {}
        Err(err) => {
            tracing::warn!(error = %err, "failed to listen for ctrl-c, shutting down anyway");
        }
    }
}
