use crate::connection::ConnectionManager;
use crate::epics::EpicsStatusItem;
use crate::error::{Error, Result};
use crate::request::RequestProducer;
use crate::topics::{CHANNEL_NAME_PROPERTY, EPICS_GET_QUEUE};

use std::sync::Arc;
use std::time::Duration;

use giapi_bus::{Body, Destination, Message};

/// Reads the current value of a single channel.
#[derive(Debug)]
pub struct EpicsFetcher {
    requests: RequestProducer,
}

impl EpicsFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            requests: RequestProducer::new(manager, Destination::queue(EPICS_GET_QUEUE)),
        }
    }

    /// Reads `channel`. `None` means the GMP does not know the channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no reply arrives in time,
    /// [`Error::Decode`] for a malformed reply and [`Error::Communication`]
    /// for bus failures.
    pub async fn get_channel(
        &self,
        channel: &str,
        timeout: Duration,
    ) -> Result<Option<EpicsStatusItem>> {
        let request = Message::empty().with_property(CHANNEL_NAME_PROPERTY, channel);
        let reply = self.requests.request(request, timeout).await?;

        match reply.body() {
            Body::Empty => Ok(None),
            Body::Bytes(bytes) => EpicsStatusItem::decode(bytes)
                .map(Some)
                .map_err(|e| Error::Decode(e.to_string())),
            _ => Err(Error::Decode(format!(
                "reply for {channel} is not a bytes message"
            ))),
        }
    }

    /// Releases the request producer.
    pub async fn close(&self) {
        self.requests.close().await;
    }
}
