//! In-memory implementation of the GIAPI message bus.
//!
//! Mostly useful for testing. Besides the usual broker semantics (topic
//! fan-out, round-robin queues, selectors, temporary queues) the broker can
//! simulate outages so that reconnect logic can be exercised.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod broker;
mod connection;
mod consumer;
mod producer;
mod router;
mod session;

pub use broker::MemoryBroker;
pub use connection::MemoryConnection;
pub use consumer::{MemoryConsumer, MemoryReceiver};
pub use producer::MemoryProducer;
pub use session::MemorySession;
