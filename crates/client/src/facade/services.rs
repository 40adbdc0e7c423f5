use crate::Giapi;
use crate::error::Result;
use crate::services::{LogLevel, observatory_time};
use crate::status_code::StatusCode;

use std::time::Duration;

/// System log, observatory time and GMP properties.
#[derive(Clone, Copy, Debug)]
pub struct ServicesUtil<'a> {
    giapi: &'a Giapi,
}

impl<'a> ServicesUtil<'a> {
    pub(crate) const fn new(giapi: &'a Giapi) -> Self {
        Self { giapi }
    }

    /// Writes to the observatory log.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the entry cannot be sent.
    pub async fn system_log(&self, level: LogLevel, message: &str) -> Result<StatusCode> {
        self.giapi
            .services_client()
            .system_log(level, message)
            .await
    }

    /// Milliseconds since the Unix epoch, UTC.
    #[must_use]
    pub fn get_observatory_time(&self) -> i64 {
        observatory_time()
    }

    /// Looks up a GMP property.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] if no reply arrives in time.
    pub async fn get_property(&self, key: &str, timeout: Duration) -> Result<Option<String>> {
        self.giapi
            .services_client()
            .get_property(key, timeout)
            .await
    }
}
