//! ciNet ingestion server binary.
//!
//! # Usage
//!
//! ```bash
//! cinet-server --bind 0.0.0.0:4509 --sub-bind 0.0.0.0:8081
//! ```
//!
//! Every option is also settable via the environment variable named in
//! [`cinet_server::Config`]; CLI flags take precedence.

use cinet_server::Config;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if config.debug {
        tracing::info!(bind = %config.bind, sub_bind = %config.sub_bind, "ciNet ingestion server starting (debug)");
    } else {
        tracing::info!("ciNet ingestion server starting");
    }

    if config.auth_secret.is_none() {
        tracing::warn!("no CINET_AUTH_SECRET configured — subscriber connections are unauthenticated");
    }

    cinet_server::run(config).await?;

    Ok(())
}
