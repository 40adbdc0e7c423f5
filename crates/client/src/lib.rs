//! Client side of the Gemini Instrument API.
//!
//! Instruments receive sequence commands, publish status items, follow EPICS
//! channels and talk to observatory services through the GMP over a message
//! bus. The connection is re-established automatically and every subscription
//! is restored after a reconnect.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Sequence commands, activities and command subscriptions.
pub mod command;

/// Client configuration.
pub mod config;

/// The shared connection and its recovery loop.
pub mod connection;

/// Observation and file events.
pub mod data;

/// EPICS channel subscriptions and reads.
pub mod epics;

mod error;

/// Entry points for instrument code.
pub mod facade;

mod giapi;

/// PCS Zernike updates.
pub mod pcs;

/// Cached producers.
pub mod publisher;

/// Request/reply over temporary queues.
pub mod request;

/// Observatory services.
pub mod services;

/// Status items and status posting.
pub mod status;

mod status_code;

/// Re-bindable consumers.
pub mod subscription;

/// TCS context reads.
pub mod tcs;

/// Bus destinations, selectors and wire constants.
pub mod topics;

pub use config::GiapiConfig;
pub use connection::{ConnectionManager, ConnectionState, RecoveryHandler};
pub use error::{Error, Result};
pub use facade::{CommandUtil, DataUtil, GeminiUtil, ServicesUtil, StatusUtil};
pub use giapi::Giapi;
pub use status_code::StatusCode;
