use std::time::Duration;

use giapi_bus::BusError;
use thiserror::Error;

/// Errors raised to callers of the GIAPI client.
///
/// Validation problems are not errors: they come back as
/// [`crate::StatusCode::Error`].
#[derive(Debug, Error)]
pub enum Error {
    /// The bus could not be reached or rejected an operation.
    #[error(transparent)]
    Communication(#[from] BusError),

    /// No reply arrived in time.
    #[error("no reply from {destination} within {timeout:?}")]
    Timeout {
        /// Where the request was sent.
        destination: String,

        /// How long the caller waited.
        timeout: Duration,
    },

    /// A reply could not be interpreted.
    #[error("malformed reply: {0}")]
    Decode(String),

    /// The connection is down and could not be re-established.
    #[error("not connected to the GMP")]
    NotConnected,
}

impl Error {
    /// Whether this is a timeout rather than a communication failure.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias for GIAPI client operations.
pub type Result<T> = std::result::Result<T, Error>;
