//! Lazily created producers for fire-and-forget publishing.

use crate::connection::{ConnectionManager, RecoveryHandler};
use crate::error::{Error, Result};

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use giapi_bus::{Destination, Message, Producer, Session};
use tracing::debug;

/// A session and producer opened for one destination.
pub(crate) struct Bound {
    pub(crate) session: Arc<dyn Session>,
    pub(crate) producer: Box<dyn Producer>,
}

impl Bound {
    pub(crate) async fn open(
        manager: &ConnectionManager,
        destination: &Destination,
    ) -> Result<Self> {
        let session = manager.create_session().await?;
        let producer = session.create_producer(destination).await?;
        Ok(Self { session, producer })
    }

    pub(crate) async fn release(self) {
        if let Err(e) = self.producer.close().await {
            debug!("Error closing producer: {}", e);
        }
        if let Err(e) = self.session.close().await {
            debug!("Error closing session: {}", e);
        }
    }
}

/// Cached binding, emptied after every reconnect.
pub(crate) type BoundSlot = Arc<tokio::sync::Mutex<Option<Bound>>>;

struct ResetOnRecovery(Weak<tokio::sync::Mutex<Option<Bound>>>);

#[async_trait]
impl RecoveryHandler for ResetOnRecovery {
    async fn on_recovery(&self) {
        let Some(slot) = self.0.upgrade() else {
            return;
        };
        let stale = slot.lock().await.take();
        if let Some(stale) = stale {
            debug!("Dropping producer bound to the lost connection");
            stale.release().await;
        }
    }
}

/// An empty slot that `manager` clears after each reconnect.
pub(crate) fn recovering_slot(manager: &ConnectionManager) -> BoundSlot {
    let slot = Arc::new(tokio::sync::Mutex::new(None));
    manager.register_recovery_handler(Arc::new(ResetOnRecovery(Arc::downgrade(&slot))));
    slot
}

/// Publishes to one destination through a cached session and producer.
///
/// Publishes are serialized. The cached producer is dropped after a reconnect;
/// one found stale before that is replaced and the send retried once.
pub struct Publisher {
    manager: Arc<ConnectionManager>,
    destination: Destination,
    bound: BoundSlot,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    /// Creates a publisher. Nothing is opened until the first publish.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, destination: Destination) -> Self {
        Self {
            bound: recovering_slot(&manager),
            manager,
            destination,
        }
    }

    /// The target destination.
    #[must_use]
    pub const fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Sends `message`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the message cannot be sent.
    pub async fn publish(&self, message: Message) -> Result<()> {
        let mut bound = self.bound.lock().await;

        match self.send_with(&mut bound, message.clone()).await {
            Err(Error::Communication(e)) if e.is_disconnect() => {
                debug!("Producer for {} went stale: {}", self.destination, e);
                *bound = None;
                self.send_with(&mut bound, message).await
            }
            other => other,
        }
    }

    async fn send_with(&self, bound: &mut Option<Bound>, message: Message) -> Result<()> {
        if bound.is_none() {
            *bound = Some(Bound::open(&self.manager, &self.destination).await?);
        }

        let Some(bound) = bound.as_ref() else {
            return Err(Error::NotConnected);
        };
        Ok(bound.producer.send(message).await?)
    }

    /// Releases the cached producer and session.
    pub async fn close(&self) {
        let bound = self.bound.lock().await.take();
        if let Some(bound) = bound {
            bound.release().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::ConnectionConfig;
    use crate::connection::ConnectionState;

    use std::time::Duration;

    use giapi_bus::{BusError, MessageConsumer, MessageListener, Receiver, Selector};
    use giapi_bus_memory::MemoryBroker;
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct Broken(Destination);

    #[async_trait]
    impl Producer for Broken {
        fn destination(&self) -> &Destination {
            &self.0
        }

        async fn send(&self, _message: Message) -> std::result::Result<(), BusError> {
            Err(BusError::ConnectionClosed)
        }

        async fn close(&self) -> std::result::Result<(), BusError> {
            Err(BusError::ConnectionClosed)
        }
    }

    #[async_trait]
    impl Session for Broken {
        async fn create_producer(
            &self,
            _destination: &Destination,
        ) -> std::result::Result<Box<dyn Producer>, BusError> {
            Err(BusError::SessionClosed)
        }

        async fn create_consumer(
            &self,
            _destination: &Destination,
            _selector: Option<Selector>,
            _listener: Arc<dyn MessageListener>,
        ) -> std::result::Result<Box<dyn MessageConsumer>, BusError> {
            Err(BusError::SessionClosed)
        }

        async fn create_receiver(
            &self,
            _destination: &Destination,
        ) -> std::result::Result<Box<dyn Receiver>, BusError> {
            Err(BusError::SessionClosed)
        }

        async fn create_temporary_queue(&self) -> std::result::Result<Destination, BusError> {
            Err(BusError::SessionClosed)
        }

        async fn delete_temporary_queue(
            &self,
            _destination: &Destination,
        ) -> std::result::Result<(), BusError> {
            Err(BusError::SessionClosed)
        }

        async fn close(&self) -> std::result::Result<(), BusError> {
            Err(BusError::SessionClosed)
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_release_logs_close_failures() {
        let topic = Destination::topic("GMP.TEST.BROKEN");
        let bound = Bound {
            session: Arc::new(Broken(topic.clone())),
            producer: Box::new(Broken(topic)),
        };

        bound.release().await;

        assert!(logs_contain("Error closing producer: connection closed"));
        assert!(logs_contain("Error closing session: session closed"));
    }

    #[tokio::test]
    async fn test_cached_producer_dropped_after_reconnect() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(
            Arc::new(broker.clone()),
            ConnectionConfig {
                reconnect_interval: Duration::from_millis(10),
                max_reconnect_attempts: None,
            },
        );
        let topic = Destination::topic("GMP.TEST.PUBLISHER");
        let publisher = Publisher::new(manager.clone(), topic.clone());

        publisher.publish(Message::text("before")).await.unwrap();
        assert!(publisher.bound.lock().await.is_some());

        let mut state = manager.subscribe_state();
        broker.disconnect_all();
        state
            .wait_for(|s| *s == ConnectionState::Reconnecting)
            .await
            .unwrap();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while publisher.bound.lock().await.is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let session = manager.create_session().await.unwrap();
        let receiver = session.create_receiver(&topic).await.unwrap();
        publisher.publish(Message::text("after")).await.unwrap();

        let received = receiver
            .receive(Some(Duration::from_secs(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.as_text(), Some("after"));
    }
}
