use crate::Giapi;
use crate::command::{ActionId, ActivitySet, HandlerResponse, SequenceCommand, SequenceCommandHandler};
use crate::error::Result;
use crate::status_code::StatusCode;

use std::sync::Arc;

/// Sequence command subscriptions and completion info.
#[derive(Clone, Copy, Debug)]
pub struct CommandUtil<'a> {
    giapi: &'a Giapi,
}

impl<'a> CommandUtil<'a> {
    pub(crate) const fn new(giapi: &'a Giapi) -> Self {
        Self { giapi }
    }

    /// Routes the activities in `set` of `command` to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the subscription fails.
    pub async fn subscribe_sequence_command(
        &self,
        command: SequenceCommand,
        set: ActivitySet,
        handler: Arc<dyn SequenceCommandHandler>,
    ) -> Result<StatusCode> {
        self.giapi
            .command_registry()
            .subscribe_sequence_command(command, set, handler)
            .await
    }

    /// Routes the activities in `set` of APPLY commands for `prefix` to
    /// `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the subscription fails.
    pub async fn subscribe_apply(
        &self,
        prefix: &str,
        set: ActivitySet,
        handler: Arc<dyn SequenceCommandHandler>,
    ) -> Result<StatusCode> {
        self.giapi
            .command_registry()
            .subscribe_apply(prefix, set, handler)
            .await
    }

    /// Stops routing `set` of `command`.
    pub async fn unsubscribe_sequence_command(
        &self,
        command: SequenceCommand,
        set: ActivitySet,
    ) -> StatusCode {
        self.giapi
            .command_registry()
            .unsubscribe_sequence_command(command, set)
            .await
    }

    /// Stops routing `set` of APPLY commands for `prefix`.
    pub async fn unsubscribe_apply(&self, prefix: &str, set: ActivitySet) -> StatusCode {
        self.giapi
            .command_registry()
            .unsubscribe_apply(prefix, set)
            .await
    }

    /// Reports the final outcome of `action_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the publish fails.
    pub async fn post_completion_info(
        &self,
        action_id: ActionId,
        response: &HandlerResponse,
    ) -> Result<StatusCode> {
        self.giapi.completion().post(action_id, response).await
    }
}
