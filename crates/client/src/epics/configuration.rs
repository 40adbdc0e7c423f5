use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::request::RequestProducer;
use crate::topics::EPICS_CHANNELS_QUEUE;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use giapi_bus::{Destination, Message};
use parking_lot::RwLock;
use tracing::{info, warn};

/// The channels the GMP allows instruments to subscribe to.
#[derive(Debug)]
pub struct EpicsConfiguration {
    requests: RequestProducer,
    channels: RwLock<HashSet<String>>,
}

impl EpicsConfiguration {
    /// Creates an uninitialized configuration.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            requests: RequestProducer::new(manager, Destination::queue(EPICS_CHANNELS_QUEUE)),
            channels: RwLock::new(HashSet::new()),
        }
    }

    /// Fetches the channel list.
    ///
    /// A timeout leaves the configuration uninitialized and returns `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] if the request cannot be made, or
    /// [`Error::Decode`] if the reply is not a map.
    pub async fn init(&self, timeout: Duration) -> Result<bool> {
        let reply = match self.requests.request(Message::empty(), timeout).await {
            Ok(reply) => reply,
            Err(e) if e.is_timeout() => {
                warn!("No EPICS channel list within {:?}, will retry on first use", timeout);
                self.channels.write().clear();
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let map = reply
            .as_map()
            .ok_or_else(|| Error::Decode("EPICS channel list is not a map".to_string()))?;
        let channels: HashSet<String> = map.keys().cloned().collect();

        info!("{} EPICS channel(s) available", channels.len());
        *self.channels.write() = channels;
        Ok(self.is_initialized())
    }

    /// Initializes once if there is no channel list yet.
    ///
    /// # Errors
    ///
    /// As [`Self::init`].
    pub async fn ensure_initialized(&self, timeout: Duration) -> Result<bool> {
        if self.is_initialized() {
            return Ok(true);
        }
        self.init(timeout).await
    }

    /// Whether `channel` may be subscribed.
    #[must_use]
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.read().contains(channel)
    }

    /// Whether a non-empty channel list is known.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.channels.read().is_empty()
    }

    /// Snapshot of the known channels.
    #[must_use]
    pub fn channels(&self) -> HashSet<String> {
        self.channels.read().clone()
    }

    /// Releases the request producer.
    pub async fn close(&self) {
        self.requests.close().await;
    }
}
