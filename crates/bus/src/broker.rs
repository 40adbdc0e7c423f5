use crate::error::BusError;
use crate::session::Session;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

/// Callback invoked when a connection is lost.
///
/// Implementations must not be invoked on the thread that caused the failure;
/// brokers call listeners from their own tasks.
#[async_trait]
pub trait ExceptionListener: Send + Sync + 'static {
    /// Called once per failure of the connection the listener is attached to.
    async fn on_exception(&self, connection_id: Uuid, error: BusError);
}

/// Entry point to a bus: produces connections.
#[async_trait]
pub trait Broker: Debug + Send + Sync + 'static {
    /// Opens a new connection.
    async fn connect(&self) -> Result<Arc<dyn Connection>, BusError>;
}

/// A connection to a broker.
#[async_trait]
pub trait Connection: Debug + Send + Sync + 'static {
    /// Identity of this connection, stable for its lifetime.
    fn id(&self) -> Uuid;

    /// Whether the connection is still usable.
    fn is_open(&self) -> bool;

    /// Starts message delivery.
    async fn start(&self) -> Result<(), BusError>;

    /// Pauses message delivery.
    async fn stop(&self) -> Result<(), BusError>;

    /// Closes the connection and everything created from it.
    async fn close(&self) -> Result<(), BusError>;

    /// Opens a new session on this connection.
    async fn create_session(&self) -> Result<Arc<dyn Session>, BusError>;

    /// Replaces the exception listener.
    fn set_exception_listener(&self, listener: Arc<dyn ExceptionListener>);
}
