//! Top-level server error type.

use thiserror::Error;

/// Errors raised by the listener and binary startup path.
///
/// Per-connection errors never reach this type: a malformed frame, an
/// unknown device, or a failed persistence write are logged and the
/// connection continues (see `cinet_core::IngestError` and the error table
/// in the design notes). This type is only for things that prevent the
/// server from running at all.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A configuration value (bind address, etc.) could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The configured bind address could not be parsed or bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// The address that failed to bind.
        address: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Accepting a new connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),
}

pub use crate::hub::HubError;
