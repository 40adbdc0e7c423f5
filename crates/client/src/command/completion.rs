use crate::command::{ActionId, HandlerResponse, Response};
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::status_code::StatusCode;
use crate::topics::{ACTION_ID_PROPERTY, COMPLETION_INFO_TOPIC};

use std::sync::Arc;

use giapi_bus::Destination;
use tracing::{debug, warn};

/// Reports the final outcome of commands answered with ACCEPTED or STARTED.
#[derive(Debug)]
pub struct CompletionInfoSender {
    publisher: Publisher,
}

impl CompletionInfoSender {
    /// Creates a sender publishing on the completion-info topic.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            publisher: Publisher::new(manager, Destination::topic(COMPLETION_INFO_TOPIC)),
        }
    }

    /// Publishes the completion of `action_id`.
    ///
    /// Only COMPLETED and ERROR are final; anything else is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the publish fails.
    pub async fn post(&self, action_id: ActionId, response: &HandlerResponse) -> Result<StatusCode> {
        if !matches!(response.response(), Response::Completed | Response::Error) {
            warn!(
                "Completion info for action {} must be COMPLETED or ERROR, not {}",
                action_id,
                response.response()
            );
            return Ok(StatusCode::Error);
        }
        if response.response() == Response::Error
            && response.message().is_none_or(str::is_empty)
        {
            warn!("Completion info for action {} is ERROR without a message", action_id);
            return Ok(StatusCode::Error);
        }

        let message = response
            .to_message()
            .with_property(ACTION_ID_PROPERTY, action_id);
        self.publisher.publish(message).await?;

        debug!("Posted completion of action {}: {}", action_id, response.response());
        Ok(StatusCode::Ok)
    }

    /// Releases the cached producer.
    pub async fn close(&self) {
        self.publisher.close().await;
    }
}
