use thiserror::Error;

/// Errors reported by a bus implementation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BusError {
    /// The broker could not be reached.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection was lost or closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The session was closed.
    #[error("session closed")]
    SessionClosed,

    /// The consumer was closed.
    #[error("consumer closed")]
    ConsumerClosed,

    /// The destination does not exist or cannot be used this way.
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// The selector expression could not be parsed.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// A message body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A message body could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

impl BusError {
    /// Whether this error means the underlying connection is gone.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::ConnectionClosed | Self::SessionClosed
        )
    }
}
