use crate::Giapi;
use crate::data::ObservationEvent;
use crate::error::Result;
use crate::status_code::StatusCode;

/// Observation and file events.
#[derive(Clone, Copy, Debug)]
pub struct DataUtil<'a> {
    giapi: &'a Giapi,
}

impl<'a> DataUtil<'a> {
    pub(crate) const fn new(giapi: &'a Giapi) -> Self {
        Self { giapi }
    }

    /// Announces `event` for `data_label`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the event cannot be sent.
    pub async fn post_observation_event(
        &self,
        event: ObservationEvent,
        data_label: &str,
    ) -> Result<StatusCode> {
        self.giapi
            .data_events()
            .post_observation_event(event, data_label)
            .await
    }

    /// Announces an ancillary file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the event cannot be sent.
    pub async fn post_ancillary_file_event(
        &self,
        filename: &str,
        data_label: &str,
    ) -> Result<StatusCode> {
        self.giapi
            .data_events()
            .post_ancillary_file_event(filename, data_label)
            .await
    }

    /// Announces an intermediate file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the event cannot be sent.
    pub async fn post_intermediate_file_event(
        &self,
        filename: &str,
        data_label: &str,
        hint: Option<&str>,
    ) -> Result<StatusCode> {
        self.giapi
            .data_events()
            .post_intermediate_file_event(filename, data_label, hint)
            .await
    }
}
