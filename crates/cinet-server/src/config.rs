//! Server configuration.
//!
//! Env-driven, the way the original `Config` dataclass's
//! `os.environ.get(...)` defaults worked, layered with `clap` so the same
//! options are also settable as CLI flags — matching the teacher binary's
//! `clap::Parser` convention.

use std::net::SocketAddr;

use clap::Parser;

use crate::error::ServerError;

/// ciNet ingestion server configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "cinet-server")]
#[command(about = "ciNet GPS beacon ingestion server")]
#[command(version)]
pub struct Config {
    /// Address the ciNet beacon listener binds to.
    #[arg(long, env = "CINET_BIND", default_value = "0.0.0.0:4509")]
    pub bind: String,

    /// Address the subscriber fan-out listener binds to.
    #[arg(long, env = "CINET_SUB_BIND", default_value = "0.0.0.0:8081")]
    pub sub_bind: String,

    /// Persistence backend connection string.
    ///
    /// Unused by this reference implementation, which only ships an
    /// in-memory `Persistence`; kept as a configuration surface so a real
    /// backend can be wired in without changing the CLI/env contract.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Shared secret subscribers must present before being attached to the
    /// hub. Unset disables the handshake (any connection is accepted).
    #[arg(long, env = "CINET_AUTH_SECRET")]
    pub auth_secret: Option<String>,

    /// Tracing filter directive (e.g. `info`, `debug`, `cinet_server=trace`).
    #[arg(long, env = "CINET_LOG", default_value = "info")]
    pub log_level: String,

    /// Verbose startup logging.
    #[arg(long, env = "CINET_DEBUG")]
    pub debug: bool,
}

impl Config {
    /// Parses the ciNet ingest bind address.
    pub fn ingest_bind(&self) -> Result<SocketAddr, ServerError> {
        self.bind
            .parse()
            .map_err(|_| ServerError::Config(format!("invalid --bind address '{}'", self.bind)))
    }

    /// Parses the subscriber fan-out bind address.
    pub fn subscriber_bind(&self) -> Result<SocketAddr, ServerError> {
        self.sub_bind
            .parse()
            .map_err(|_| ServerError::Config(format!("invalid --sub-bind address '{}'", self.sub_bind)))
    }
}
