//! The single bus connection shared by every GIAPI component.

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

use std::fmt;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use giapi_bus::{Broker, BusError, Connection, ExceptionListener, Session};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle of the managed connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and nobody is trying to establish one.
    Disconnected,

    /// A caller is establishing the first connection.
    Connecting,

    /// The connection is up.
    Connected,

    /// The connection was lost and the recovery loop is running.
    Reconnecting,
}

/// Something that must run after the connection is restored.
#[async_trait]
pub trait RecoveryHandler: Send + Sync + 'static {
    /// Called once per successful reconnection.
    async fn on_recovery(&self);
}

struct FnRecovery<F>(F);

#[async_trait]
impl<F> RecoveryHandler for FnRecovery<F>
where
    F: Fn() + Send + Sync + 'static,
{
    async fn on_recovery(&self) {
        (self.0)();
    }
}

/// Wraps a closure as a [`RecoveryHandler`].
///
/// Registering the returned handle twice has no effect; registering two
/// handles built from the same closure registers it twice.
pub fn recovery_fn<F>(f: F) -> Arc<dyn RecoveryHandler>
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(FnRecovery(f))
}

struct WeakRecovery<T>(Weak<T>);

#[async_trait]
impl<T> RecoveryHandler for WeakRecovery<T>
where
    T: RecoveryHandler,
{
    async fn on_recovery(&self) {
        if let Some(target) = self.0.upgrade() {
            target.on_recovery().await;
        }
    }
}

/// A handler that forwards to `target` for as long as it is alive.
///
/// Components owning an `Arc<ConnectionManager>` register through this so
/// the manager does not keep them alive.
pub fn weak_recovery<T>(target: &Arc<T>) -> Arc<dyn RecoveryHandler>
where
    T: RecoveryHandler,
{
    Arc::new(WeakRecovery(Arc::downgrade(target)))
}

struct Live {
    connection: Arc<dyn Connection>,
}

struct Lost {
    manager: Weak<ConnectionManager>,
}

#[async_trait]
impl ExceptionListener for Lost {
    async fn on_exception(&self, connection_id: Uuid, error: BusError) {
        if let Some(manager) = self.manager.upgrade() {
            warn!("Connection {} reported: {}", connection_id, error);
            manager.report_failure(connection_id);
        }
    }
}

/// Owns the process-wide bus connection.
///
/// Sessions are handed out on demand. When the broker reports the connection
/// lost, a single recovery loop reconnects at a fixed interval and then runs the
/// registered recovery handlers in registration order. Callers asking for a
/// session meanwhile wait until the loop finishes.
pub struct ConnectionManager {
    broker: Arc<dyn Broker>,
    config: ConnectionConfig,
    live: ArcSwapOption<Live>,
    state: watch::Sender<ConnectionState>,
    connect_lock: tokio::sync::Mutex<()>,
    handlers: Mutex<Vec<Arc<dyn RecoveryHandler>>>,
    this: Weak<Self>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("connection", &self.connection_id())
            .field("handlers", &self.handlers.lock().len())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a manager for `broker`. No connection is made yet.
    pub fn new(broker: Arc<dyn Broker>, config: ConnectionConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            broker,
            config,
            live: ArcSwapOption::empty(),
            state: watch::channel(ConnectionState::Disconnected).0,
            connect_lock: tokio::sync::Mutex::new(()),
            handlers: Mutex::new(Vec::new()),
            this: this.clone(),
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Whether a connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
            && self
                .live
                .load()
                .as_ref()
                .is_some_and(|live| live.connection.is_open())
    }

    /// Identity of the live connection, if any.
    #[must_use]
    pub fn connection_id(&self) -> Option<Uuid> {
        self.live.load().as_ref().map(|live| live.connection.id())
    }

    /// Watches state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Adds a recovery handler. A handler already registered is not added again.
    pub fn register_recovery_handler(&self, handler: Arc<dyn RecoveryHandler>) {
        let mut handlers = self.handlers.lock();
        if handlers.iter().any(|known| Arc::ptr_eq(known, &handler)) {
            debug!("Recovery handler already registered");
            return;
        }
        handlers.push(handler);
    }

    /// Removes a recovery handler.
    pub fn unregister_recovery_handler(&self, handler: &Arc<dyn RecoveryHandler>) {
        self.handlers
            .lock()
            .retain(|known| !Arc::ptr_eq(known, handler));
    }

    /// Returns the live connection, connecting first if there is none.
    ///
    /// Waits while a recovery loop is running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] when the broker cannot be reached.
    pub async fn get_connection(&self) -> Result<Arc<dyn Connection>> {
        loop {
            if self.state() == ConnectionState::Reconnecting {
                self.wait_out_recovery().await;
                if self.state() == ConnectionState::Disconnected {
                    return Err(Error::NotConnected);
                }
                continue;
            }

            if let Some(live) = self.live.load_full() {
                if live.connection.is_open() {
                    return Ok(live.connection.clone());
                }
                // Lost, but the broker has not told us yet.
                self.report_failure(live.connection.id());
                tokio::task::yield_now().await;
                continue;
            }

            let _guard = self.connect_lock.lock().await;
            if self.live.load().is_some() || self.state() == ConnectionState::Reconnecting {
                continue;
            }

            self.state.send_replace(ConnectionState::Connecting);
            return match self.establish().await {
                Ok(connection) => {
                    self.state.send_replace(ConnectionState::Connected);
                    Ok(connection)
                }
                Err(e) => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    error!("Unable to connect to the GMP: {}", e);
                    Err(e)
                }
            };
        }
    }

    /// Opens a new session on the live connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] when no connection can be made.
    pub async fn create_session(&self) -> Result<Arc<dyn Session>> {
        let connection = self.get_connection().await?;
        Ok(connection.create_session().await?)
    }

    /// Closes the connection. A later [`Self::get_connection`] reconnects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Communication`] if the broker refuses to close.
    pub async fn close(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        let live = self.live.swap(None);
        self.state.send_replace(ConnectionState::Disconnected);
        if let Some(live) = live {
            info!("Closing connection {}", live.connection.id());
            live.connection.close().await?;
        }
        Ok(())
    }

    async fn wait_out_recovery(&self) {
        let mut state = self.state.subscribe();
        let waited = state
            .wait_for(|state| *state != ConnectionState::Reconnecting)
            .await
            .is_ok();
        if !waited {
            debug!("State channel closed while waiting for recovery");
        }
    }

    async fn establish(&self) -> Result<Arc<dyn Connection>> {
        let connection = self.broker.connect().await?;
        connection.set_exception_listener(Arc::new(Lost {
            manager: self.this.clone(),
        }));
        connection.start().await?;

        info!("Connected to the GMP as {}", connection.id());
        self.live.store(Some(Arc::new(Live {
            connection: connection.clone(),
        })));

        Ok(connection)
    }

    /// Starts the recovery loop for a failure of connection `failed` on its
    /// own task.
    ///
    /// Reports about connections other than the live one are ignored, as are
    /// reports arriving while a loop is already running. Returns whether a
    /// loop was started.
    fn report_failure(&self, failed: Uuid) -> bool {
        if self.connection_id() != Some(failed) {
            debug!("Ignoring failure of stale connection {}", failed);
            return false;
        }
        let Some(this) = self.this.upgrade() else {
            return false;
        };

        let claimed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Reconnecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            debug!("Recovery already in progress");
            return false;
        }

        // Never on the reporting task: it may hold locks the handlers need.
        tokio::spawn(async move {
            this.recover(failed).await;
        });
        true
    }

    /// Reconnects after the failure of `failed`, then runs the recovery
    /// handlers. The caller has already moved the state to `Reconnecting`.
    async fn recover(&self, failed: Uuid) {
        warn!("Connection {} lost, reconnecting", failed);

        if let Some(dead) = self.live.swap(None) {
            if let Err(e) = dead.connection.stop().await {
                debug!("Could not stop dead connection: {}", e);
            }
            if let Err(e) = dead.connection.close().await {
                debug!("Could not close dead connection: {}", e);
            }
        }

        let mut attempts: u32 = 0;
        loop {
            tokio::time::sleep(self.config.reconnect_interval).await;
            attempts = attempts.saturating_add(1);

            match self.establish().await {
                Ok(_) => break,
                Err(e) => {
                    warn!("Reconnect attempt {} failed: {}", attempts, e);
                    if self
                        .config
                        .max_reconnect_attempts
                        .is_some_and(|max| attempts >= max)
                    {
                        error!("Giving up reconnecting after {} attempts", attempts);
                        self.state.send_replace(ConnectionState::Disconnected);
                        return;
                    }
                }
            }
        }

        self.state.send_replace(ConnectionState::Connected);
        info!("Connection restored after {} attempt(s)", attempts);

        let handlers = self.handlers.lock().clone();
        for handler in handlers {
            handler.on_recovery().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use giapi_bus_memory::MemoryBroker;

    fn fast() -> ConnectionConfig {
        ConnectionConfig {
            reconnect_interval: Duration::from_millis(10),
            max_reconnect_attempts: None,
        }
    }

    #[tokio::test]
    async fn test_connects_lazily_once() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(Arc::new(broker.clone()), fast());
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        let first = manager.get_connection().await.unwrap();
        let second = manager.get_connection().await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(broker.connection_count(), 1);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_is_communication_error() {
        let broker = MemoryBroker::new();
        broker.set_available(false);
        let manager = ConnectionManager::new(Arc::new(broker), fast());

        let result = manager.create_session().await;

        assert!(matches!(result, Err(Error::Communication(_))));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_duplicate_handlers_run_once() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(Arc::new(broker.clone()), fast());
        manager.get_connection().await.unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handler = recovery_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        manager.register_recovery_handler(handler.clone());
        manager.register_recovery_handler(handler);

        let mut state = manager.subscribe_state();
        broker.disconnect_all();
        state
            .wait_for(|s| *s == ConnectionState::Reconnecting)
            .await
            .unwrap();
        manager.create_session().await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bounded_reconnect_gives_up() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(
            Arc::new(broker.clone()),
            ConnectionConfig {
                reconnect_interval: Duration::from_millis(5),
                max_reconnect_attempts: Some(2),
            },
        );
        manager.get_connection().await.unwrap();

        let mut state = manager.subscribe_state();
        broker.set_available(false);
        broker.disconnect_all();

        state
            .wait_for(|s| *s == ConnectionState::Reconnecting)
            .await
            .unwrap();
        state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();
        assert!(manager.connection_id().is_none());

        broker.set_available(true);
        assert!(manager.get_connection().await.is_ok());
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[derive(Debug)]
    struct Ignore;

    #[async_trait]
    impl crate::epics::EpicsStatusHandler for Ignore {
        async fn channel_changed(&self, _item: crate::epics::EpicsStatusItem) {}
    }

    #[tokio::test]
    async fn test_dead_connection_noticed_under_a_lock() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(Arc::new(broker.clone()), fast());
        let registry =
            crate::epics::EpicsRegistry::new(manager.clone(), Duration::from_millis(100));
        manager.get_connection().await.unwrap();

        // The request path holds its own lock while asking for a session, and the
        // EPICS recovery handler needs that same lock.
        broker.disconnect_all();
        let subscribed = tokio::time::timeout(
            Duration::from_secs(3),
            registry.subscribe("tc1:sad", Arc::new(Ignore)),
        )
        .await;

        assert!(matches!(subscribed, Ok(Ok(crate::StatusCode::Error))));
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(Arc::new(broker.clone()), fast());
        manager.get_connection().await.unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let calls = calls.clone();
            manager.register_recovery_handler(recovery_fn(move || calls.lock().push(name)));
        }

        broker.disconnect_all();
        tokio::time::timeout(Duration::from_secs(1), async {
            while calls.lock().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(*calls.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_second_failure_report_during_recovery_is_ignored() {
        let broker = MemoryBroker::new();
        let manager = ConnectionManager::new(Arc::new(broker.clone()), fast());
        let first = manager.get_connection().await.unwrap().id();

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        manager.register_recovery_handler(recovery_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let lost = Lost {
            manager: Arc::downgrade(&manager),
        };
        lost.on_exception(first, BusError::ConnectionClosed).await;
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert!(!manager.report_failure(first));
        lost.on_exception(first, BusError::ConnectionClosed).await;

        let mut state = manager.subscribe_state();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_ne!(manager.connection_id(), Some(first));
        assert_eq!(broker.connection_count(), 1);
        assert_eq!(manager.state(), ConnectionState::Connected);
    }
}
