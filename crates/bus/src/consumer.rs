use crate::error::BusError;
use crate::message::Message;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

/// Receives messages delivered to an asynchronous consumer.
///
/// Deliveries to one listener are sequential.
#[async_trait]
pub trait MessageListener: Send + Sync + 'static {
    /// Handles one message.
    async fn on_message(&self, message: Message);
}

/// An asynchronous consumer feeding a [`MessageListener`].
#[async_trait]
pub trait MessageConsumer: Debug + Send + Sync {
    /// Stops delivery.
    ///
    /// Waits for a delivery in progress to finish, unless called from inside
    /// that delivery.
    async fn close(&self) -> Result<(), BusError>;
}

/// A synchronous consumer.
#[async_trait]
pub trait Receiver: Debug + Send + Sync {
    /// Waits for the next message.
    ///
    /// `None` waits forever. Returns `Ok(None)` when the timeout elapses.
    async fn receive(&self, timeout: Option<Duration>) -> Result<Option<Message>, BusError>;

    /// Releases the receiver.
    async fn close(&self) -> Result<(), BusError>;
}
