//! TCS context reads.

use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::request::RequestProducer;
use crate::topics::TCS_CONTEXT_QUEUE;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use giapi_bus::{BusError, Destination, Message, StreamReader, StreamWriter};

/// Number of doubles in an encoded context.
pub const TCS_CONTEXT_LEN: usize = 39;

/// Snapshot of the telescope control system context.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TcsContext {
    /// Time of the snapshot
    pub time: f64,
    /// Position x
    pub x: f64,
    /// Position y
    pub y: f64,
    /// Position z
    pub z: f64,
    /// Telescope parameters
    pub telescope: [f64; 8],
    /// Adaptive optics parameters
    pub aoprms: [f64; 15],
    /// M2 tip/tilt pairs
    pub m2xy: [[f64; 2]; 3],
    /// Pointing origin
    pub pointing_origin: [f64; 6],
}

impl TcsContext {
    /// Decodes a context reply.
    ///
    /// # Errors
    ///
    /// Fails when fewer than [`TCS_CONTEXT_LEN`] doubles are present.
    pub fn decode(bytes: &Bytes) -> std::result::Result<Self, BusError> {
        let mut reader = StreamReader::new(bytes.clone());
        let mut context = Self {
            time: reader.read_double()?,
            x: reader.read_double()?,
            y: reader.read_double()?,
            z: reader.read_double()?,
            ..Self::default()
        };
        for v in &mut context.telescope {
            *v = reader.read_double()?;
        }
        for v in &mut context.aoprms {
            *v = reader.read_double()?;
        }
        for pair in &mut context.m2xy {
            for v in pair {
                *v = reader.read_double()?;
            }
        }
        for v in &mut context.pointing_origin {
            *v = reader.read_double()?;
        }
        Ok(context)
    }

    /// Encodes the context the way the GMP replies with it.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut writer = StreamWriter::new();
        for v in [self.time, self.x, self.y, self.z]
            .iter()
            .chain(&self.telescope)
            .chain(&self.aoprms)
            .chain(self.m2xy.iter().flatten())
            .chain(&self.pointing_origin)
        {
            writer.write_double(*v);
        }
        writer.finish()
    }
}

/// Requests the TCS context from the GMP.
#[derive(Debug)]
pub struct TcsFetcher {
    requests: RequestProducer,
}

impl TcsFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            requests: RequestProducer::new(manager, Destination::queue(TCS_CONTEXT_QUEUE)),
        }
    }

    /// Fetches the current context. A zero `timeout` waits forever.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no reply arrives in time and
    /// [`Error::Decode`] for a malformed reply.
    pub async fn get_tcs_context(&self, timeout: Duration) -> Result<TcsContext> {
        let reply = self.requests.request(Message::empty(), timeout).await?;
        let bytes = reply
            .as_bytes()
            .ok_or_else(|| Error::Decode("TCS context reply is not a bytes message".to_string()))?;
        TcsContext::decode(bytes).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Releases the cached producer.
    pub async fn close(&self) {
        self.requests.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn test_field_layout() {
        let mut writer = StreamWriter::new();
        for i in 0..TCS_CONTEXT_LEN {
            writer.write_double(f64::from(u32::try_from(i).unwrap()));
        }

        let context = TcsContext::decode(&writer.finish()).unwrap();

        assert_eq!(context.time, 0.0);
        assert_eq!(context.z, 3.0);
        assert_eq!(context.telescope[0], 4.0);
        assert_eq!(context.aoprms[14], 26.0);
        assert_eq!(context.m2xy[1], [29.0, 30.0]);
        assert_eq!(context.pointing_origin[5], 38.0);
        assert_eq!(context.encode().len(), TCS_CONTEXT_LEN * 8);
    }

    #[test]
    fn test_short_reply() {
        let mut writer = StreamWriter::new();
        writer.write_double(1.0);

        assert_matches!(TcsContext::decode(&writer.finish()), Err(BusError::Decode(_)));
    }
}
