use crate::command::{
    Activity, ActivityHolder, ActivitySet, CommandKey, SequenceCommand, SequenceCommandConsumer,
    SequenceCommandHandler,
};
use crate::connection::{ConnectionManager, RecoveryHandler, weak_recovery};
use crate::error::Result;
use crate::status_code::StatusCode;
use crate::subscription::release_all;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{error, info, warn};

/// Every command subscription of the process, keyed by command or APPLY prefix.
#[derive(Debug)]
pub struct CommandRegistry {
    manager: Arc<ConnectionManager>,
    holders: Mutex<HashMap<CommandKey, ActivityHolder<SequenceCommandConsumer>>>,
}

impl CommandRegistry {
    /// Creates an empty registry that re-subscribes after reconnects.
    pub fn new(manager: Arc<ConnectionManager>) -> Arc<Self> {
        let registry = Arc::new(Self {
            manager: manager.clone(),
            holders: Mutex::new(HashMap::new()),
        });
        manager.register_recovery_handler(weak_recovery(&registry));
        registry
    }

    /// Routes `set` of `command` to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the bus subscription fails.
    pub async fn subscribe_sequence_command(
        &self,
        command: SequenceCommand,
        set: ActivitySet,
        handler: Arc<dyn SequenceCommandHandler>,
    ) -> Result<StatusCode> {
        if command == SequenceCommand::Apply {
            warn!("APPLY is subscribed by prefix, not as a sequence command");
            return Ok(StatusCode::Error);
        }
        self.subscribe(CommandKey::Sequence(command), set, handler)
            .await
    }

    /// Routes `set` of APPLY commands for `prefix` to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the bus subscription fails.
    pub async fn subscribe_apply(
        &self,
        prefix: &str,
        set: ActivitySet,
        handler: Arc<dyn SequenceCommandHandler>,
    ) -> Result<StatusCode> {
        if prefix.is_empty() {
            warn!("APPLY prefix must not be empty");
            return Ok(StatusCode::Error);
        }
        self.subscribe(CommandKey::Apply(prefix.to_string()), set, handler)
            .await
    }

    async fn subscribe(
        &self,
        key: CommandKey,
        set: ActivitySet,
        handler: Arc<dyn SequenceCommandHandler>,
    ) -> Result<StatusCode> {
        let consumer = Arc::new(
            SequenceCommandConsumer::create(self.manager.clone(), key.clone(), set, handler)
                .await?,
        );

        let released = self
            .holders
            .lock()
            .entry(key.clone())
            .or_default()
            .register_consumer(set, consumer);

        info!("Subscribed {} {}", key, set);
        release_all(released).await;
        Ok(StatusCode::Ok)
    }

    /// Stops routing `set` of `command`.
    pub async fn unsubscribe_sequence_command(
        &self,
        command: SequenceCommand,
        set: ActivitySet,
    ) -> StatusCode {
        self.unsubscribe(&CommandKey::Sequence(command), set).await
    }

    /// Stops routing `set` of APPLY commands for `prefix`.
    pub async fn unsubscribe_apply(&self, prefix: &str, set: ActivitySet) -> StatusCode {
        self.unsubscribe(&CommandKey::Apply(prefix.to_string()), set)
            .await
    }

    async fn unsubscribe(&self, key: &CommandKey, set: ActivitySet) -> StatusCode {
        let released = {
            let mut holders = self.holders.lock();
            let Some(holder) = holders.get_mut(key) else {
                warn!("Nothing subscribed for {}", key);
                return StatusCode::Warning;
            };
            let released = holder.unregister_consumer(set);
            if holder.is_empty() {
                holders.remove(key);
            }
            released
        };

        info!("Unsubscribed {} {}", key, set);
        release_all(released).await;
        StatusCode::Ok
    }

    /// The consumer currently serving `activity` of `key`.
    #[must_use]
    pub fn consumer(&self, key: &CommandKey, activity: Activity) -> Option<Arc<SequenceCommandConsumer>> {
        self.holders.lock().get(key)?.consumer(activity)
    }

    /// Releases every subscription.
    pub async fn close(&self) {
        let released: Vec<_> = self
            .holders
            .lock()
            .drain()
            .flat_map(|(_, mut holder)| holder.drain())
            .collect();
        release_all(released).await;
    }
}

#[async_trait]
impl RecoveryHandler for CommandRegistry {
    async fn on_recovery(&self) {
        let consumers: Vec<_> = self
            .holders
            .lock()
            .values()
            .flat_map(ActivityHolder::consumers)
            .collect();

        info!("Re-subscribing {} command consumer(s)", consumers.len());
        for consumer in consumers {
            if let Err(e) = consumer.rebind().await {
                error!("Could not re-subscribe {}: {}", consumer.key(), e);
            }
        }
    }
}
