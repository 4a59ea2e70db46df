//! Error types for the ciNet wire codec.
//!
//! These are pure framing/decryption errors: they know nothing about devices,
//! persistence, or subscribers. Callers that need that context wrap
//! [`FrameError`] in a richer error type (see `cinet_core::IngestError`).

use thiserror::Error;

/// Errors that can occur while validating or parsing a ciNet frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than 149 bytes were handed to the decoder.
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// Start byte or packet type did not match the ciNet header.
    #[error("bad frame header")]
    BadHeader,

    /// Outer CRC-16 over bytes [0..147) did not match the stored value.
    #[error("outer CRC-16 mismatch")]
    BadOuterCrc,

    /// Inner CRC-16 over the decrypted payload did not match the stored
    /// value. Most often caused by decrypting with the wrong passphrase.
    #[error("inner CRC-16 mismatch (wrong passphrase?)")]
    BadInnerCrc,
}
