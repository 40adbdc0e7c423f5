//! Rebindable bus subscriptions.

use crate::connection::ConnectionManager;
use crate::error::Result;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use giapi_bus::{Destination, MessageConsumer, MessageListener, Selector, Session};
use parking_lot::RwLock;
use tracing::{debug, warn};

/// The session a subscription is currently bound to, shared with its listener
/// so replies go out on the same session.
#[derive(Clone, Debug, Default)]
pub struct SessionCell(Arc<RwLock<Option<Arc<dyn Session>>>>);

impl SessionCell {
    /// The current session, if bound.
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn Session>> {
        self.0.read().clone()
    }

    fn replace(&self, session: Option<Arc<dyn Session>>) -> Option<Arc<dyn Session>> {
        std::mem::replace(&mut *self.0.write(), session)
    }
}

/// A consumer holding bus resources that must be released explicitly.
#[async_trait]
pub trait ConsumerResource: Send + Sync + 'static {
    /// Tears down the subscription.
    async fn release(&self);
}

/// Releases every consumer in `released`.
pub async fn release_all<C>(released: Vec<Arc<C>>)
where
    C: ConsumerResource,
{
    for consumer in released {
        consumer.release().await;
    }
}

struct Bound {
    session: Arc<dyn Session>,
    consumer: Box<dyn MessageConsumer>,
}

/// A consumer on its own session that can be re-created after a reconnect.
pub struct BusSubscription {
    manager: Arc<ConnectionManager>,
    destination: Destination,
    selector: Option<Selector>,
    listener: Arc<dyn MessageListener>,
    session: SessionCell,
    bound: tokio::sync::Mutex<Option<Bound>>,
}

impl fmt::Debug for BusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSubscription")
            .field("destination", &self.destination)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl BusSubscription {
    /// Subscribes `listener` to `destination`.
    ///
    /// # Errors
    ///
    /// Fails when no session or consumer can be created.
    pub async fn open(
        manager: Arc<ConnectionManager>,
        destination: Destination,
        selector: Option<Selector>,
        listener: Arc<dyn MessageListener>,
        session: SessionCell,
    ) -> Result<Self> {
        let subscription = Self {
            manager,
            destination,
            selector,
            listener,
            session,
            bound: tokio::sync::Mutex::new(None),
        };
        subscription.rebind().await?;
        Ok(subscription)
    }

    /// The subscribed destination.
    #[must_use]
    pub const fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Drops the current consumer and session, if any, and subscribes again.
    ///
    /// # Errors
    ///
    /// Fails when no session or consumer can be created; the subscription is
    /// then left unbound.
    pub async fn rebind(&self) -> Result<()> {
        let mut bound = self.bound.lock().await;
        if let Some(old) = bound.take() {
            Self::release(old).await;
        }

        let session = self.manager.create_session().await?;
        let consumer = match session
            .create_consumer(
                &self.destination,
                self.selector.clone(),
                self.listener.clone(),
            )
            .await
        {
            Ok(consumer) => consumer,
            Err(e) => {
                if let Err(cleanup) = session.close().await {
                    debug!("Error closing session: {}", cleanup);
                }
                return Err(e.into());
            }
        };

        self.session.replace(Some(session.clone()));
        *bound = Some(Bound { session, consumer });
        debug!("Subscribed to {}", self.destination);
        Ok(())
    }

    /// Stops delivery and releases the session.
    ///
    /// Waits for a delivery in progress unless called from inside it.
    pub async fn close(&self) {
        let old = self.bound.lock().await.take();
        self.session.replace(None);
        if let Some(old) = old {
            Self::release(old).await;
            debug!("Unsubscribed from {}", self.destination);
        }
    }

    async fn release(bound: Bound) {
        if let Err(e) = bound.consumer.close().await {
            warn!("Error closing consumer: {}", e);
        }
        if let Err(e) = bound.session.close().await {
            warn!("Error closing session: {}", e);
        }
    }
}
