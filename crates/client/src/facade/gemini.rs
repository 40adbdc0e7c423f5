use crate::Giapi;
use crate::epics::{EpicsStatusHandler, EpicsStatusItem};
use crate::error::Result;
use crate::status_code::StatusCode;
use crate::tcs::TcsContext;

use std::sync::Arc;
use std::time::Duration;

/// EPICS channels, PCS updates and the TCS context.
#[derive(Clone, Copy, Debug)]
pub struct GeminiUtil<'a> {
    giapi: &'a Giapi,
}

impl<'a> GeminiUtil<'a> {
    pub(crate) const fn new(giapi: &'a Giapi) -> Self {
        Self { giapi }
    }

    /// Delivers updates of `channel` to `handler`.
    ///
    /// Channels the GMP does not offer are an error.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the subscription fails.
    pub async fn subscribe_epics_status(
        &self,
        channel: &str,
        handler: Arc<dyn EpicsStatusHandler>,
    ) -> Result<StatusCode> {
        self.giapi.epics_registry().subscribe(channel, handler).await
    }

    /// Stops delivering updates of `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the channel list cannot be
    /// fetched.
    pub async fn unsubscribe_epics_status(&self, channel: &str) -> Result<StatusCode> {
        self.giapi.epics_registry().unsubscribe(channel).await
    }

    /// Sends Zernike coefficients to the PCS.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the update cannot be sent.
    pub async fn post_pcs_update(&self, zernikes: &[f64]) -> Result<StatusCode> {
        self.giapi.pcs().post_pcs_update(zernikes).await
    }

    /// Reads the TCS context. A zero `timeout` waits forever.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] if no reply arrives in time.
    pub async fn get_tcs_context(&self, timeout: Duration) -> Result<TcsContext> {
        self.giapi.tcs().get_tcs_context(timeout).await
    }

    /// Reads the current value of `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] if no reply arrives in time.
    pub async fn get_channel(
        &self,
        channel: &str,
        timeout: Duration,
    ) -> Result<Option<EpicsStatusItem>> {
        self.giapi.epics_fetcher().get_channel(channel, timeout).await
    }
}
