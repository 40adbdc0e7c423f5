//! Thin entry points grouped the way instrument code uses them.
//!
//! Validation problems come back as [`crate::StatusCode::Error`]; bus failures
//! and timeouts are [`crate::Error`]s.

mod command;
mod data;
mod gemini;
mod services;
mod status;

pub use command::CommandUtil;
pub use data::DataUtil;
pub use gemini::GeminiUtil;
pub use services::ServicesUtil;
pub use status::StatusUtil;
