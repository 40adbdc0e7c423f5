//! Observatory services: system log, time and properties.

use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::publisher::Publisher;
use crate::request::RequestProducer;
use crate::status_code::StatusCode;
use crate::topics::{
    LOG_LEVEL_PROPERTY, PROPERTY_KEY, PROPERTY_REQUEST_TYPE, REQUEST_TYPE_PROPERTY,
    SERVICES_LOG_TOPIC, UTIL_REQUEST_QUEUE,
};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use giapi_bus::{Body, Destination, MapBody, MapValue, Message};
use tracing::{debug, warn};

/// Severity of a system log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// Informational
    Info,
    /// Something looks wrong
    Warning,
    /// Something is wrong
    Severe,
}

impl LogLevel {
    /// Name on the wire.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Severe => "SEVERE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Milliseconds since the Unix epoch, UTC.
#[must_use]
pub fn observatory_time() -> i64 {
    Utc::now().timestamp_millis()
}

/// Client side of the observatory services.
#[derive(Debug)]
pub struct Services {
    log: Publisher,
    requests: RequestProducer,
}

impl Services {
    /// Creates the services client.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            log: Publisher::new(manager.clone(), Destination::topic(SERVICES_LOG_TOPIC)),
            requests: RequestProducer::new(manager, Destination::queue(UTIL_REQUEST_QUEUE)),
        }
    }

    /// Sends `message` to the observatory log.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] if the entry cannot be sent.
    pub async fn system_log(&self, level: LogLevel, message: &str) -> Result<StatusCode> {
        let message = Message::text(message).with_property(LOG_LEVEL_PROPERTY, level.keyword());
        self.log.publish(message).await?;
        Ok(StatusCode::Ok)
    }

    /// Looks up a GMP property. Empty keys and empty answers are `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no reply arrives in time.
    pub async fn get_property(&self, key: &str, timeout: Duration) -> Result<Option<String>> {
        if key.is_empty() {
            warn!("Property lookup without a key");
            return Ok(None);
        }

        let mut body = MapBody::new();
        body.insert(PROPERTY_KEY.to_string(), MapValue::from(key));
        let request =
            Message::map(body).with_property(REQUEST_TYPE_PROPERTY, PROPERTY_REQUEST_TYPE);

        let reply = self.requests.request(request, timeout).await?;
        match reply.body() {
            Body::Empty => Ok(None),
            Body::Text(value) if value.is_empty() => Ok(None),
            Body::Text(value) => {
                debug!("Property {} = {}", key, value);
                Ok(Some(value.clone()))
            }
            _ => Err(Error::Decode(format!(
                "reply for property {key} is not a text message"
            ))),
        }
    }

    /// Releases the cached producers.
    pub async fn close(&self) {
        self.log.close().await;
        self.requests.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observatory_time_is_current() {
        let before = Utc::now().timestamp_millis();
        let now = observatory_time();

        assert!(now >= before);
        assert!(now - before < 1_000);
    }
}
