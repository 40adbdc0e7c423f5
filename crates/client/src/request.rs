//! Request/reply over temporary queues.

use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::publisher::{Bound, BoundSlot, recovering_slot};

use std::sync::Arc;
use std::time::Duration;

use giapi_bus::{Destination, Message};
use tracing::{debug, warn};

/// Sends requests to a well-known destination and waits for the reply on a
/// temporary queue created per call.
pub struct RequestProducer {
    manager: Arc<ConnectionManager>,
    destination: Destination,
    bound: BoundSlot,
}

impl std::fmt::Debug for RequestProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestProducer")
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

/// Zero means "wait forever".
#[must_use]
pub fn wait_limit(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

impl RequestProducer {
    /// Creates a request producer for `destination`.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, destination: Destination) -> Self {
        Self {
            bound: recovering_slot(&manager),
            manager,
            destination,
        }
    }

    /// The request destination.
    #[must_use]
    pub const fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Sends `request` and returns the single reply.
    ///
    /// A zero `timeout` waits forever.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when no reply arrives in time and
    /// [`Error::Communication`] when the bus fails.
    pub async fn request(&self, request: Message, timeout: Duration) -> Result<Message> {
        let result = self.exchange(request, wait_limit(timeout)).await;

        if let Err(Error::Communication(e)) = &result {
            if e.is_disconnect() {
                debug!("Dropping stale request producer for {}", self.destination);
                *self.bound.lock().await = None;
            }
        }

        result
    }

    async fn exchange(&self, mut request: Message, timeout: Option<Duration>) -> Result<Message> {
        let (session, receiver, reply_to) = {
            let mut bound = self.bound.lock().await;
            if bound.is_none() {
                *bound = Some(Bound::open(&self.manager, &self.destination).await?);
            }
            let Some(current) = bound.as_ref() else {
                return Err(Error::NotConnected);
            };

            let reply_to = current.session.create_temporary_queue().await?;
            let receiver = match current.session.create_receiver(&reply_to).await {
                Ok(receiver) => receiver,
                Err(e) => {
                    if let Err(cleanup) = current.session.delete_temporary_queue(&reply_to).await {
                        debug!("Error deleting {}: {}", reply_to, cleanup);
                    }
                    return Err(e.into());
                }
            };

            request.set_reply_to(reply_to.clone());
            if let Err(e) = current.producer.send(request).await {
                if let Err(cleanup) = receiver.close().await {
                    debug!("Error closing reply receiver: {}", cleanup);
                }
                if let Err(cleanup) = current.session.delete_temporary_queue(&reply_to).await {
                    debug!("Error deleting {}: {}", reply_to, cleanup);
                }
                return Err(e.into());
            }

            (current.session.clone(), receiver, reply_to)
        };

        let reply = receiver.receive(timeout).await;

        if let Err(e) = receiver.close().await {
            warn!("Error closing reply receiver: {}", e);
        }
        if let Err(e) = session.delete_temporary_queue(&reply_to).await {
            warn!("Error deleting {}: {}", reply_to, e);
        }

        match reply? {
            Some(reply) => Ok(reply),
            None => Err(Error::Timeout {
                destination: self.destination.name().to_string(),
                timeout: timeout.unwrap_or_default(),
            }),
        }
    }

    /// Releases the cached producer and session.
    pub async fn close(&self) {
        let bound = self.bound.lock().await.take();
        if let Some(bound) = bound {
            bound.release().await;
        }
    }
}
