use crate::session::SessionInner;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use giapi_bus::{BusError, Message, MessageConsumer, MessageListener, Receiver};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

tokio::task_local! {
    static DELIVERING: Uuid;
}

async fn wait_started(started: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *started.borrow_and_update() {
            return true;
        }
        if started.changed().await.is_err() {
            return false;
        }
    }
}

/// An asynchronous consumer with its own delivery task.
#[derive(Debug)]
pub struct MemoryConsumer {
    id: Uuid,
    session: Arc<SessionInner>,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryConsumer {
    pub(crate) fn spawn(
        id: Uuid,
        session: Arc<SessionInner>,
        mut receiver: mpsc::UnboundedReceiver<Message>,
        listener: Arc<dyn MessageListener>,
    ) -> Self {
        let token = session.token.child_token();
        let task_token = token.clone();
        let mut started = session.started.clone();

        let handle = tokio::spawn(DELIVERING.scope(id, async move {
            loop {
                let message = tokio::select! {
                    biased;
                    () = task_token.cancelled() => break,
                    message = receiver.recv() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };

                let ready = tokio::select! {
                    biased;
                    () = task_token.cancelled() => false,
                    ready = wait_started(&mut started) => ready,
                };
                if !ready {
                    break;
                }

                listener.on_message(message).await;
            }
        }));

        Self {
            id,
            session,
            token,
            handle: Mutex::new(Some(handle)),
        }
    }
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    async fn close(&self) -> Result<(), BusError> {
        self.session.broker.router.lock().detach(self.id);
        self.token.cancel();

        let inside_delivery = DELIVERING
            .try_with(|current| *current == self.id)
            .unwrap_or(false);
        if inside_delivery {
            return Ok(());
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Delivery task of consumer {} failed: {}", self.id, e);
            }
        }

        debug!("Consumer {} closed", self.id);
        Ok(())
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// A synchronous receiver.
#[derive(Debug)]
pub struct MemoryReceiver {
    id: Uuid,
    session: Arc<SessionInner>,
    token: CancellationToken,
    closed: AtomicBool,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
}

impl MemoryReceiver {
    pub(crate) fn new(
        id: Uuid,
        session: Arc<SessionInner>,
        receiver: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        let token = session.token.child_token();
        Self {
            id,
            session,
            token,
            closed: AtomicBool::new(false),
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    fn closed_error(&self) -> BusError {
        if self.closed.load(Ordering::SeqCst) {
            return BusError::ConsumerClosed;
        }
        self.session
            .ensure_open()
            .err()
            .unwrap_or(BusError::ConsumerClosed)
    }
}

#[async_trait]
impl Receiver for MemoryReceiver {
    async fn receive(&self, timeout: Option<Duration>) -> Result<Option<Message>, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::ConsumerClosed);
        }
        self.session.ensure_open()?;

        let mut receiver = self.receiver.lock().await;
        let next = async {
            tokio::select! {
                biased;
                () = self.token.cancelled() => None,
                message = receiver.recv() => message,
            }
        };

        let message = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, next).await {
                Ok(message) => message,
                Err(_) => return Ok(None),
            },
            None => next.await,
        };

        message.map_or_else(|| Err(self.closed_error()), |message| Ok(Some(message)))
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        self.token.cancel();
        self.session.broker.router.lock().detach(self.id);
        Ok(())
    }
}
