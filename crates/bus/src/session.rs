use crate::consumer::{MessageConsumer, MessageListener, Receiver};
use crate::destination::Destination;
use crate::error::BusError;
use crate::producer::Producer;
use crate::selector::Selector;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

/// A logical channel on a connection.
#[async_trait]
pub trait Session: Debug + Send + Sync + 'static {
    /// Creates a producer bound to `destination`.
    async fn create_producer(&self, destination: &Destination)
    -> Result<Box<dyn Producer>, BusError>;

    /// Creates an asynchronous consumer on `destination`, optionally filtered by `selector`.
    async fn create_consumer(
        &self,
        destination: &Destination,
        selector: Option<Selector>,
        listener: Arc<dyn MessageListener>,
    ) -> Result<Box<dyn MessageConsumer>, BusError>;

    /// Creates a synchronous receiver on `destination`.
    async fn create_receiver(&self, destination: &Destination)
    -> Result<Box<dyn Receiver>, BusError>;

    /// Creates a temporary queue owned by this session.
    async fn create_temporary_queue(&self) -> Result<Destination, BusError>;

    /// Deletes a temporary queue created by this session.
    async fn delete_temporary_queue(&self, destination: &Destination) -> Result<(), BusError>;

    /// Closes the session and every producer and consumer created from it.
    async fn close(&self) -> Result<(), BusError>;
}
