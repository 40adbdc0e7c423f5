//! PCS Zernike updates.

use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::status_code::StatusCode;
use crate::topics::PCS_UPDATE_TOPIC;

use std::sync::Arc;

use bytes::Bytes;
use giapi_bus::{BusError, Destination, Message, StreamWriter};
use tracing::warn;

/// Encodes Zernike coefficients: an i32 count then the doubles.
///
/// # Errors
///
/// Fails when there are more coefficients than an i32 can count.
pub fn encode_zernikes(zernikes: &[f64]) -> std::result::Result<Bytes, BusError> {
    let count = i32::try_from(zernikes.len())
        .map_err(|_| BusError::Encode("too many Zernike coefficients".to_string()))?;

    let mut writer = StreamWriter::new();
    writer.write_int(count);
    for z in zernikes {
        writer.write_double(*z);
    }
    Ok(writer.finish())
}

/// Sends Zernike updates to the PCS.
#[derive(Debug)]
pub struct PcsUpdater {
    publisher: Publisher,
}

impl PcsUpdater {
    /// Creates an updater.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            publisher: Publisher::new(manager, Destination::topic(PCS_UPDATE_TOPIC)),
        }
    }

    /// Publishes `zernikes`. An empty slice is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the update cannot be sent.
    pub async fn post_pcs_update(&self, zernikes: &[f64]) -> Result<StatusCode> {
        if zernikes.is_empty() {
            warn!("Refusing PCS update without Zernike coefficients");
            return Ok(StatusCode::Error);
        }

        let body = encode_zernikes(zernikes)?;
        self.publisher.publish(Message::bytes(body)).await?;
        Ok(StatusCode::Ok)
    }

    /// Releases the cached producer.
    pub async fn close(&self) {
        self.publisher.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use giapi_bus::StreamReader;

    #[test]
    fn test_count_prefix() {
        let mut reader = StreamReader::new(encode_zernikes(&[0.5, -1.0]).unwrap());

        assert_eq!(reader.read_int().unwrap(), 2);
        assert_eq!(reader.read_double().unwrap(), 0.5);
        assert_eq!(reader.read_double().unwrap(), -1.0);
        assert_eq!(reader.remaining(), 0);
    }
}
