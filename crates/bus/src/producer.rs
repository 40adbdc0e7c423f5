use crate::destination::Destination;
use crate::error::BusError;
use crate::message::Message;

use std::fmt::Debug;

use async_trait::async_trait;

/// Sends messages to one destination.
#[async_trait]
pub trait Producer: Debug + Send + Sync {
    /// The destination this producer sends to.
    fn destination(&self) -> &Destination;

    /// Sends a message.
    async fn send(&self, message: Message) -> Result<(), BusError>;

    /// Releases the producer.
    async fn close(&self) -> Result<(), BusError>;
}
