use crate::broker::BrokerState;
use crate::session::MemorySession;

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use giapi_bus::{BusError, Connection, ExceptionListener, Session};
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// A connection to a [`crate::MemoryBroker`].
pub struct MemoryConnection {
    pub(crate) id: Uuid,
    pub(crate) broker: Arc<BrokerState>,
    pub(crate) open: Arc<AtomicBool>,
    pub(crate) started: watch::Sender<bool>,
    pub(crate) token: CancellationToken,
    listener: RwLock<Option<Arc<dyn ExceptionListener>>>,
}

impl Debug for MemoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("id", &self.id)
            .field("open", &self.open.load(Ordering::SeqCst))
            .field("started", &*self.started.borrow())
            .finish_non_exhaustive()
    }
}

impl MemoryConnection {
    pub(crate) fn new(broker: Arc<BrokerState>) -> Self {
        Self {
            id: Uuid::new_v4(),
            broker,
            open: Arc::new(AtomicBool::new(true)),
            started: watch::channel(false).0,
            token: CancellationToken::new(),
            listener: RwLock::new(None),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<(), BusError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BusError::ConnectionClosed)
        }
    }

    /// Marks the connection closed and detaches its consumers.
    ///
    /// Returns `false` if it was already closed.
    pub(crate) fn teardown(&self) -> bool {
        if !self.open.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        self.broker.router.lock().detach_connection(self.id);
        true
    }

    pub(crate) fn notify_exception(&self, error: BusError) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            let id = self.id;
            tokio::spawn(async move {
                listener.on_exception(id, error).await;
            });
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn start(&self) -> Result<(), BusError> {
        self.ensure_open()?;
        self.started.send_replace(true);
        Ok(())
    }

    async fn stop(&self) -> Result<(), BusError> {
        self.ensure_open()?;
        self.started.send_replace(false);
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        if self.teardown() {
            debug!("Memory connection {} closed", self.id);
        }
        self.broker.forget(self.id);
        Ok(())
    }

    async fn create_session(&self) -> Result<Arc<dyn Session>, BusError> {
        self.ensure_open()?;
        Ok(Arc::new(MemorySession::new(self)))
    }

    fn set_exception_listener(&self, listener: Arc<dyn ExceptionListener>) {
        *self.listener.write() = Some(listener);
    }
}
