use crate::command::{
    Activity, ActivitySet, CommandKey, Configuration, HandlerResponse, SequenceCommandHandler,
};
use crate::connection::ConnectionManager;
use crate::error::{Error, Result};
use crate::subscription::{BusSubscription, ConsumerResource, SessionCell};
use crate::topics::{self, ACTION_ID_PROPERTY, ACTIVITY_PROPERTY};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use giapi_bus::{Destination, Message, MessageListener};
use tracing::{debug, error, warn};

struct CommandListener {
    key: CommandKey,
    handler: Arc<dyn SequenceCommandHandler>,
    session: SessionCell,
}

impl CommandListener {
    async fn dispatch(&self, message: &Message) -> HandlerResponse {
        let Some(action_id) = message.int_property(ACTION_ID_PROPERTY) else {
            warn!("{} command without {}", self.key, ACTION_ID_PROPERTY);
            return HandlerResponse::error(format!("missing {ACTION_ID_PROPERTY}"));
        };

        let activity = match message.string_property(ACTIVITY_PROPERTY) {
            Some(raw) => match raw.parse::<Activity>() {
                Ok(activity) => activity,
                Err(e) => {
                    warn!("{} command {}: {}", self.key, action_id, e);
                    return HandlerResponse::error(e.to_string());
                }
            },
            None => {
                warn!("{} command {} without {}", self.key, action_id, ACTIVITY_PROPERTY);
                return HandlerResponse::error(format!("missing {ACTIVITY_PROPERTY}"));
            }
        };

        let config = Configuration::from_message(message);
        debug!(
            "Dispatching {} {} action {} ({} entries)",
            self.key,
            activity,
            action_id,
            config.len()
        );

        let handled = AssertUnwindSafe(self.handler.handle(
            action_id,
            self.key.command(),
            activity,
            config,
        ))
        .catch_unwind()
        .await;

        handled.unwrap_or_else(|_| {
            error!("Handler for {} {} panicked", self.key, activity);
            HandlerResponse::error("handler panicked")
        })
    }

    async fn reply(&self, reply_to: &Destination, response: &HandlerResponse) -> Result<()> {
        let session = self.session.get().ok_or(Error::NotConnected)?;
        let producer = session.create_producer(reply_to).await?;
        let sent = producer.send(response.to_message()).await;
        if let Err(e) = producer.close().await {
            debug!("Error closing reply producer: {}", e);
        }
        Ok(sent?)
    }
}

#[async_trait]
impl MessageListener for CommandListener {
    async fn on_message(&self, message: Message) {
        let response = self.dispatch(&message).await;

        let Some(reply_to) = message.reply_to() else {
            warn!(
                "{} command has no reply destination, dropping {}",
                self.key,
                response.response()
            );
            return;
        };

        if let Err(e) = self.reply(reply_to, &response).await {
            error!("Failed to reply to {} command: {}", self.key, e);
        }
    }
}

/// Routes one command (or APPLY prefix) and activity set to a handler,
/// answering each command on its reply destination.
#[derive(Debug)]
pub struct SequenceCommandConsumer {
    key: CommandKey,
    set: ActivitySet,
    subscription: BusSubscription,
}

impl SequenceCommandConsumer {
    /// Subscribes `handler` on a dedicated session.
    ///
    /// # Errors
    ///
    /// Fails when the subscription cannot be created.
    pub async fn create(
        manager: Arc<ConnectionManager>,
        key: CommandKey,
        set: ActivitySet,
        handler: Arc<dyn SequenceCommandHandler>,
    ) -> Result<Self> {
        let session = SessionCell::default();
        let listener = Arc::new(CommandListener {
            key: key.clone(),
            handler,
            session: session.clone(),
        });

        let subscription = BusSubscription::open(
            manager,
            topics::command_topic(&key),
            Some(topics::activity_selector(set)),
            listener,
            session,
        )
        .await?;

        Ok(Self {
            key,
            set,
            subscription,
        })
    }

    /// The command or prefix served.
    #[must_use]
    pub const fn key(&self) -> &CommandKey {
        &self.key
    }

    /// The activity set served.
    #[must_use]
    pub const fn activity_set(&self) -> ActivitySet {
        self.set
    }

    /// Re-creates the bus subscription.
    ///
    /// # Errors
    ///
    /// Fails when the subscription cannot be created.
    pub async fn rebind(&self) -> Result<()> {
        self.subscription.rebind().await
    }
}

#[async_trait]
impl ConsumerResource for SequenceCommandConsumer {
    async fn release(&self) {
        self.subscription.close().await;
    }
}
