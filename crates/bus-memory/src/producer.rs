use crate::session::SessionInner;

use std::sync::Arc;

use async_trait::async_trait;
use giapi_bus::{BusError, Destination, Message, Producer};

/// A producer created by a [`crate::MemorySession`].
#[derive(Debug)]
pub struct MemoryProducer {
    destination: Destination,
    session: Arc<SessionInner>,
}

impl MemoryProducer {
    pub(crate) const fn new(destination: Destination, session: Arc<SessionInner>) -> Self {
        Self {
            destination,
            session,
        }
    }
}

#[async_trait]
impl Producer for MemoryProducer {
    fn destination(&self) -> &Destination {
        &self.destination
    }

    async fn send(&self, message: Message) -> Result<(), BusError> {
        self.session.ensure_open()?;
        self.session
            .broker
            .router
            .lock()
            .route(&self.destination, message)
    }

    async fn close(&self) -> Result<(), BusError> {
        Ok(())
    }
}
