//! Error types for the pushlink-proto crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    /// Failed to encode an outbound payload.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Inbound text was not valid JSON.
    #[error("decoding error: {0}")]
    Decoding(String),
}
