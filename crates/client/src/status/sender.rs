use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::publisher::Publisher;
use crate::status::{StatusDatabase, StatusItem, StatusSnapshot, encode_status};
use crate::status_code::StatusCode;
use crate::topics;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use giapi_bus::{Destination, Message};
use tracing::{info, warn};

/// Publishes dirty status items.
///
/// Implementors only provide [`StatusSender::transmit`]; dirty tracking is
/// shared by all senders.
#[async_trait]
pub trait StatusSender: Debug + Send + Sync {
    /// Sends one snapshot.
    async fn transmit(&self, snapshot: &StatusSnapshot) -> Result<()>;

    /// Posts one item if it changed since its last post.
    ///
    /// Unknown names are [`StatusCode::Error`]; an unchanged item is a no-op.
    async fn post_status(&self, database: &StatusDatabase, name: &str) -> Result<StatusCode> {
        let Some(item) = database.get(name) else {
            warn!("Cannot post unknown status item {}", name);
            return Ok(StatusCode::Error);
        };
        post_item(self, &item).await?;
        Ok(StatusCode::Ok)
    }

    /// Posts every dirty item in creation order.
    ///
    /// Failures are logged and skipped.
    async fn post_all_status(&self, database: &StatusDatabase) -> Result<StatusCode> {
        for item in database.items() {
            if let Err(e) = post_item(self, &item).await {
                warn!("Failed to post status item {}: {}", item.name(), e);
            }
        }
        Ok(StatusCode::Ok)
    }

    /// Releases bus resources held by the sender.
    async fn close(&self) {}
}

async fn post_item<S>(sender: &S, item: &StatusItem) -> Result<()>
where
    S: StatusSender + ?Sized,
{
    if !item.take_dirty() {
        return Ok(());
    }

    let snapshot = item.snapshot();
    if let Err(e) = sender.transmit(&snapshot).await {
        item.mark_dirty();
        return Err(e);
    }
    Ok(())
}

/// Sends status updates to the status topic.
#[derive(Debug)]
pub struct BusStatusSender {
    publisher: Publisher,
}

impl BusStatusSender {
    /// Creates a sender publishing through `manager`.
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            publisher: Publisher::new(manager, Destination::topic(topics::STATUS_TOPIC)),
        }
    }
}

#[async_trait]
impl StatusSender for BusStatusSender {
    async fn transmit(&self, snapshot: &StatusSnapshot) -> Result<()> {
        let body = encode_status(snapshot)?;
        self.publisher.publish(Message::bytes(body)).await
    }

    async fn close(&self) {
        self.publisher.close().await;
    }
}

/// Writes status updates to the log instead of the bus.
#[derive(Debug, Default)]
pub struct LogStatusSender;

#[async_trait]
impl StatusSender for LogStatusSender {
    async fn transmit(&self, snapshot: &StatusSnapshot) -> Result<()> {
        info!(
            "Status {} = {} at {}",
            snapshot.name, snapshot.value, snapshot.timestamp
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::status::StatusType;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use giapi_bus::BusError;

    #[derive(Debug, Default)]
    struct CountingSender {
        sent: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl StatusSender for CountingSender {
        async fn transmit(&self, _snapshot: &StatusSnapshot) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::Communication(BusError::ConnectionClosed));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_only_changes_are_posted() {
        let db = StatusDatabase::new();
        db.create_status_item("x", StatusType::Int).unwrap();
        let sender = CountingSender::default();

        assert_eq!(sender.post_status(&db, "x").await.unwrap(), StatusCode::Ok);
        db.set_value_as_int("x", 5).unwrap();
        sender.post_status(&db, "x").await.unwrap();
        db.set_value_as_int("x", 5).unwrap();
        sender.post_status(&db, "x").await.unwrap();

        assert_eq!(sender.sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_item_is_error() {
        let db = StatusDatabase::new();

        assert_eq!(
            LogStatusSender.post_status(&db, "nope").await.unwrap(),
            StatusCode::Error
        );
    }

    #[tokio::test]
    async fn test_failed_post_stays_dirty() {
        let db = StatusDatabase::new();
        let item = db.create_status_item("x", StatusType::Int).unwrap();
        let sender = CountingSender::default();
        sender.failing.store(true, Ordering::SeqCst);

        assert!(sender.post_status(&db, "x").await.is_err());
        assert!(item.is_dirty());
        assert_eq!(sender.post_all_status(&db).await.unwrap(), StatusCode::Ok);

        sender.failing.store(false, Ordering::SeqCst);
        sender.post_all_status(&db).await.unwrap();

        assert!(!item.is_dirty());
        assert_eq!(sender.sent.load(Ordering::SeqCst), 1);
    }
}
