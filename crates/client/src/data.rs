//! Observation and file events for the data handling system.

use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::status_code::StatusCode;
use crate::topics::{
    DATA_LABEL_KEY, EVENT_KEY, FILE_EVENT_TOPIC, FILE_EVENT_TYPE_PROPERTY, FILENAME_KEY, HINT_KEY,
    OBSERVATION_EVENT_TOPIC,
};

use std::fmt;
use std::sync::Arc;

use giapi_bus::{Destination, MapBody, MapValue, Message};
use tracing::warn;

/// Stages of an observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObservationEvent {
    /// Preparing the observation
    ObsPrep,
    /// Acquisition started
    ObsStartAcq,
    /// Acquisition ended
    ObsEndAcq,
    /// Readout started
    ObsStartReadout,
    /// Readout ended
    ObsEndReadout,
    /// Dataset write started
    ObsStartDsetWrite,
    /// Dataset write ended
    ObsEndDsetWrite,
}

impl ObservationEvent {
    /// All events in observation order.
    pub const ALL: [Self; 7] = [
        Self::ObsPrep,
        Self::ObsStartAcq,
        Self::ObsEndAcq,
        Self::ObsStartReadout,
        Self::ObsEndReadout,
        Self::ObsStartDsetWrite,
        Self::ObsEndDsetWrite,
    ];

    /// Name on the wire.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::ObsPrep => "OBS_PREP",
            Self::ObsStartAcq => "OBS_START_ACQ",
            Self::ObsEndAcq => "OBS_END_ACQ",
            Self::ObsStartReadout => "OBS_START_READOUT",
            Self::ObsEndReadout => "OBS_END_READOUT",
            Self::ObsStartDsetWrite => "OBS_START_DSET_WRITE",
            Self::ObsEndDsetWrite => "OBS_END_DSET_WRITE",
        }
    }
}

impl fmt::Display for ObservationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Kind of file announced by a file event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileEventType {
    /// Ancillary file
    Ancillary,
    /// Intermediate file
    Intermediate,
}

impl FileEventType {
    /// Value of the file event type property.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Ancillary => 0,
            Self::Intermediate => 1,
        }
    }
}

/// Publishes data events.
#[derive(Debug)]
pub struct DataEventPublisher {
    observations: Publisher,
    files: Publisher,
}

impl DataEventPublisher {
    /// Creates a publisher for both event topics.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            observations: Publisher::new(
                manager.clone(),
                Destination::topic(OBSERVATION_EVENT_TOPIC),
            ),
            files: Publisher::new(manager, Destination::topic(FILE_EVENT_TOPIC)),
        }
    }

    /// Announces `event` for the dataset `data_label`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the event cannot be sent.
    pub async fn post_observation_event(
        &self,
        event: ObservationEvent,
        data_label: &str,
    ) -> Result<StatusCode> {
        if data_label.is_empty() {
            warn!("Refusing {} without a data label", event);
            return Ok(StatusCode::Error);
        }

        let mut body = MapBody::new();
        body.insert(EVENT_KEY.to_string(), MapValue::from(event.keyword()));
        body.insert(DATA_LABEL_KEY.to_string(), MapValue::from(data_label));
        self.observations.publish(Message::map(body)).await?;
        Ok(StatusCode::Ok)
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
        self.post_file_event(FileEventType::Ancillary, filename, data_label, None)
            .await
    }

    /// Announces an intermediate file with an optional hint.
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
        self.post_file_event(FileEventType::Intermediate, filename, data_label, hint)
            .await
    }

    async fn post_file_event(
        &self,
        kind: FileEventType,
        filename: &str,
        data_label: &str,
        hint: Option<&str>,
    ) -> Result<StatusCode> {
        if filename.is_empty() || data_label.is_empty() {
            warn!("Refusing file event with empty filename or data label");
            return Ok(StatusCode::Error);
        }

        let mut body = MapBody::new();
        body.insert(FILENAME_KEY.to_string(), MapValue::from(filename));
        body.insert(DATA_LABEL_KEY.to_string(), MapValue::from(data_label));
        if let Some(hint) = hint.filter(|h| !h.is_empty()) {
            body.insert(HINT_KEY.to_string(), MapValue::from(hint));
        }

        let message = Message::map(body).with_property(FILE_EVENT_TYPE_PROPERTY, kind.code());
        self.files.publish(message).await?;
        Ok(StatusCode::Ok)
    }

    /// Releases the cached producers.
    pub async fn close(&self) {
        self.observations.close().await;
        self.files.close().await;
    }
}
