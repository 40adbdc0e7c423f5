use crate::connection::{ConnectionManager, RecoveryHandler, weak_recovery};
use crate::epics::{EpicsConfiguration, EpicsConsumer, EpicsStatusHandler};
use crate::error::Result;
use crate::status_code::StatusCode;
use crate::subscription::ConsumerResource;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{error, info, warn};

/// EPICS subscriptions of the process, one consumer per channel.
#[derive(Debug)]
pub struct EpicsRegistry {
    manager: Arc<ConnectionManager>,
    configuration: EpicsConfiguration,
    init_timeout: Duration,
    consumers: Mutex<HashMap<String, Arc<EpicsConsumer>>>,
}

impl EpicsRegistry {
    /// Creates a registry that re-fetches the channel list and re-subscribes
    /// after reconnects.
    pub fn new(manager: Arc<ConnectionManager>, init_timeout: Duration) -> Arc<Self> {
        let registry = Arc::new(Self {
            configuration: EpicsConfiguration::new(manager.clone()),
            manager: manager.clone(),
            init_timeout,
            consumers: Mutex::new(HashMap::new()),
        });
        manager.register_recovery_handler(weak_recovery(&registry));
        registry
    }

    /// The channel list.
    #[must_use]
    pub const fn configuration(&self) -> &EpicsConfiguration {
        &self.configuration
    }

    async fn admit(&self, channel: &str) -> Result<bool> {
        if channel.is_empty() {
            warn!("EPICS channel name must not be empty");
            return Ok(false);
        }
        self.configuration
            .ensure_initialized(self.init_timeout)
            .await?;
        if !self.configuration.has_channel(channel) {
            warn!("EPICS channel {} is not available", channel);
            return Ok(false);
        }
        Ok(true)
    }

    /// Delivers updates of `channel` to `handler`, replacing any previous
    /// handler of that channel.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the channel list or the
    /// subscription cannot be obtained.
    pub async fn subscribe(
        &self,
        channel: &str,
        handler: Arc<dyn EpicsStatusHandler>,
    ) -> Result<StatusCode> {
        if !self.admit(channel).await? {
            return Ok(StatusCode::Error);
        }

        let consumer =
            Arc::new(EpicsConsumer::create(self.manager.clone(), channel, handler).await?);
        let previous = self
            .consumers
            .lock()
            .insert(channel.to_string(), consumer);

        if let Some(previous) = previous {
            previous.release().await;
        }
        info!("Subscribed to EPICS channel {}", channel);
        Ok(StatusCode::Ok)
    }

    /// Stops delivering updates of `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the channel list cannot be
    /// obtained.
    pub async fn unsubscribe(&self, channel: &str) -> Result<StatusCode> {
        if !self.admit(channel).await? {
            return Ok(StatusCode::Error);
        }

        let removed = self.consumers.lock().remove(channel);
        if let Some(consumer) = removed {
            consumer.release().await;
            info!("Unsubscribed from EPICS channel {}", channel);
        }
        Ok(StatusCode::Ok)
    }

    /// Whether `channel` has a handler.
    #[must_use]
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.consumers.lock().contains_key(channel)
    }

    /// Releases every subscription.
    pub async fn close(&self) {
        let consumers: Vec<_> = self.consumers.lock().drain().map(|(_, c)| c).collect();
        for consumer in consumers {
            consumer.release().await;
        }
        self.configuration.close().await;
    }
}

#[async_trait]
impl RecoveryHandler for EpicsRegistry {
    async fn on_recovery(&self) {
        match self.configuration.init(self.init_timeout).await {
            Ok(true) => {}
            Ok(false) => warn!("EPICS channel list unavailable after reconnect"),
            Err(e) => error!("Could not re-fetch EPICS channel list: {}", e),
        }

        let consumers: Vec<_> = self.consumers.lock().values().cloned().collect();
        for consumer in consumers {
            if let Err(e) = consumer.rebind().await {
                error!("Could not re-subscribe to {}: {}", consumer.channel(), e);
            }
        }
    }
}
