//! Abstract interface for the publish/subscribe message bus used to talk to the GMP.
//!
//! The bus is treated as an external capability: implementations provide
//! connections, sessions, producers, consumers with selectors, temporary queues
//! for request/reply, and an exception callback when the connection is lost.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Brokers hand out connections; connections report their own loss.
pub mod broker;

/// Consumers deliver messages to listeners or to synchronous receivers.
pub mod consumer;

/// Destinations name topics, queues and temporary queues.
pub mod destination;

mod error;

/// Messages carry properties, an optional reply-to and a typed body.
pub mod message;

/// Producers send messages to a destination.
pub mod producer;

/// JMS-style selector expressions over message properties.
pub mod selector;

/// Sessions are logical channels bound to one connection.
pub mod session;

/// Big-endian data stream codec for bytes message bodies.
pub mod stream;

pub use broker::{Broker, Connection, ExceptionListener};
pub use consumer::{MessageConsumer, MessageListener, Receiver};
pub use destination::Destination;
pub use error::BusError;
pub use message::{Body, MapBody, MapValue, Message, Property};
pub use producer::Producer;
pub use selector::Selector;
pub use session::Session;
pub use stream::{StreamReader, StreamWriter};
