use crate::broker::BrokerState;
use crate::connection::MemoryConnection;
use crate::consumer::{MemoryConsumer, MemoryReceiver};
use crate::producer::MemoryProducer;
use crate::router::Subscriber;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use giapi_bus::{
    BusError, Destination, MessageConsumer, MessageListener, Producer, Receiver, Selector, Session,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
pub struct SessionInner {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub broker: Arc<BrokerState>,
    pub token: CancellationToken,
    pub started: watch::Receiver<bool>,
    connection_open: Arc<AtomicBool>,
    open: AtomicBool,
}

impl SessionInner {
    pub fn ensure_open(&self) -> Result<(), BusError> {
        if !self.connection_open.load(Ordering::SeqCst) {
            return Err(BusError::ConnectionClosed);
        }
        if !self.open.load(Ordering::SeqCst) {
            return Err(BusError::SessionClosed);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        destination: &Destination,
        selector: Option<Selector>,
    ) -> Result<(Uuid, mpsc::UnboundedReceiver<giapi_bus::Message>), BusError> {
        self.ensure_open()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.broker.router.lock().attach(
            destination,
            Subscriber {
                id,
                connection_id: self.connection_id,
                session_id: self.id,
                selector,
                sender,
            },
        )?;

        Ok((id, receiver))
    }
}

/// A session on a [`MemoryConnection`].
#[derive(Debug)]
pub struct MemorySession {
    inner: Arc<SessionInner>,
}

impl MemorySession {
    pub(crate) fn new(connection: &MemoryConnection) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                connection_id: connection.id,
                broker: connection.broker.clone(),
                token: connection.token.child_token(),
                started: connection.started.subscribe(),
                connection_open: connection.open.clone(),
                open: AtomicBool::new(true),
            }),
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn create_producer(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn Producer>, BusError> {
        self.inner.ensure_open()?;
        Ok(Box::new(MemoryProducer::new(
            destination.clone(),
            self.inner.clone(),
        )))
    }

    async fn create_consumer(
        &self,
        destination: &Destination,
        selector: Option<Selector>,
        listener: Arc<dyn MessageListener>,
    ) -> Result<Box<dyn MessageConsumer>, BusError> {
        let (id, receiver) = self.inner.subscribe(destination, selector)?;
        debug!("Consumer {} attached to {}", id, destination);

        Ok(Box::new(MemoryConsumer::spawn(
            id,
            self.inner.clone(),
            receiver,
            listener,
        )))
    }

    async fn create_receiver(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn Receiver>, BusError> {
        let (id, receiver) = self.inner.subscribe(destination, None)?;

        Ok(Box::new(MemoryReceiver::new(
            id,
            self.inner.clone(),
            receiver,
        )))
    }

    async fn create_temporary_queue(&self) -> Result<Destination, BusError> {
        self.inner.ensure_open()?;

        let name = format!("temp-{}", Uuid::new_v4());
        self.inner
            .broker
            .router
            .lock()
            .add_temporary(name.clone(), self.inner.connection_id);

        Ok(Destination::TemporaryQueue(name))
    }

    async fn delete_temporary_queue(&self, destination: &Destination) -> Result<(), BusError> {
        match destination {
            Destination::TemporaryQueue(name) => {
                self.inner.broker.router.lock().remove_temporary(name);
                Ok(())
            }
            other => Err(BusError::InvalidDestination(other.to_string())),
        }
    }

    async fn close(&self) -> Result<(), BusError> {
        if self.inner.open.swap(false, Ordering::SeqCst) {
            self.inner.token.cancel();
            self.inner.broker.router.lock().detach_session(self.inner.id);
            debug!("Memory session {} closed", self.inner.id);
        }
        Ok(())
    }
}
