use crate::connection::MemoryConnection;
use crate::router::Router;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use giapi_bus::{Broker, BusError, Connection, Destination};
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct BrokerState {
    pub router: Mutex<Router>,
    available: AtomicBool,
    connections: Mutex<HashMap<Uuid, Weak<MemoryConnection>>>,
}

impl BrokerState {
    pub fn forget(&self, connection_id: Uuid) {
        self.connections.lock().remove(&connection_id);
    }
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            router: Mutex::new(Router::default()),
            available: AtomicBool::new(true),
            connections: Mutex::new(HashMap::new()),
        }
    }
}

/// An in-memory broker. Clones share the same routing state.
#[derive(Clone, Debug, Default)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    /// Creates a broker that accepts connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes new connection attempts fail (`false`) or succeed (`true`).
    pub fn set_available(&self, available: bool) {
        info!("Memory broker availability set to {}", available);
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Whether new connections are accepted.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state.available.load(Ordering::SeqCst)
    }

    /// Drops every open connection, as a broker restart would.
    ///
    /// Consumers of the dropped connections stop receiving and each
    /// connection's exception listener is notified from a separate task.
    pub fn disconnect_all(&self) {
        let connections: Vec<Arc<MemoryConnection>> = self
            .state
            .connections
            .lock()
            .drain()
            .filter_map(|(_, connection)| connection.upgrade())
            .collect();

        warn!("Memory broker dropping {} connection(s)", connections.len());

        for connection in connections {
            if connection.teardown() {
                connection.notify_exception(BusError::ConnectionClosed);
            }
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state
            .connections
            .lock()
            .values()
            .filter(|connection| connection.strong_count() > 0)
            .count()
    }

    /// Number of consumers and receivers attached to `destination`.
    #[must_use]
    pub fn subscriber_count(&self, destination: &Destination) -> usize {
        self.state.router.lock().subscriber_count(destination)
    }

    /// Number of queued messages waiting for a consumer on `destination`.
    #[must_use]
    pub fn pending_count(&self, destination: &Destination) -> usize {
        self.state.router.lock().pending_count(destination)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn connect(&self) -> Result<Arc<dyn Connection>, BusError> {
        if !self.is_available() {
            return Err(BusError::ConnectionFailed(
                "memory broker is unavailable".to_string(),
            ));
        }

        let connection = Arc::new(MemoryConnection::new(self.state.clone()));
        self.state
            .connections
            .lock()
            .insert(connection.id(), Arc::downgrade(&connection));

        info!("Memory connection {} established", connection.id());

        Ok(connection)
    }
}
