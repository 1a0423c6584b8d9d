//! Error types for pushlink.

use thiserror::Error;

/// Errors that can occur in client operations.
///
/// Failures inside a running connection never reach the caller of
/// [`ConnectionManager::connect`](crate::ConnectionManager::connect); they
/// are logged and surface as status transitions instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Endpoint URL could not be built.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// Opening the transport failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The open transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] pushlink_proto::ProtoError),
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
