use crate::connection::ConnectionManager;
use crate::epics::{EpicsStatusHandler, EpicsStatusItem};
use crate::error::Result;
use crate::subscription::{BusSubscription, ConsumerResource, SessionCell};
use crate::topics;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use giapi_bus::{Message, MessageListener};
use tracing::{error, warn};

struct EpicsListener {
    channel: String,
    handler: Arc<dyn EpicsStatusHandler>,
}

#[async_trait]
impl MessageListener for EpicsListener {
    async fn on_message(&self, message: Message) {
        let Some(bytes) = message.as_bytes() else {
            warn!("Update of {} is not a bytes message", self.channel);
            return;
        };

        let item = match EpicsStatusItem::decode(bytes) {
            Ok(item) => item,
            Err(e) => {
                warn!("Could not decode update of {}: {}", self.channel, e);
                return;
            }
        };

        let handled = AssertUnwindSafe(self.handler.channel_changed(item))
            .catch_unwind()
            .await;
        if handled.is_err() {
            error!("Handler for {} panicked", self.channel);
        }
    }
}

/// Delivers updates of one channel to a handler.
#[derive(Debug)]
pub struct EpicsConsumer {
    channel: String,
    subscription: BusSubscription,
}

impl EpicsConsumer {
    /// Subscribes `handler` to `channel` on a dedicated session.
    ///
    /// # Errors
    ///
    /// Fails when the subscription cannot be created.
    pub async fn create(
        manager: Arc<ConnectionManager>,
        channel: &str,
        handler: Arc<dyn EpicsStatusHandler>,
    ) -> Result<Self> {
        let listener = Arc::new(EpicsListener {
            channel: channel.to_string(),
            handler,
        });

        let subscription = BusSubscription::open(
            manager,
            topics::epics_topic(channel),
            None,
            listener,
            SessionCell::default(),
        )
        .await?;

        Ok(Self {
            channel: channel.to_string(),
            subscription,
        })
    }

    /// The channel.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Re-creates the bus subscription.
    ///
    /// # Errors
    ///
    /// Fails when the subscription cannot be created.
    pub async fn rebind(&self) -> Result<()> {
        self.subscription.rebind().await
    }
}

#[async_trait]
impl ConsumerResource for EpicsConsumer {
    async fn release(&self) {
        self.subscription.close().await;
    }
}
