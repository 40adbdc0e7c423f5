//! The process-wide client context.

use crate::command::{CommandRegistry, CompletionInfoSender};
use crate::config::{GiapiConfig, StatusSenderKind};
use crate::connection::ConnectionManager;
use crate::data::DataEventPublisher;
use crate::epics::{EpicsFetcher, EpicsRegistry};
use crate::error::Result;
use crate::facade::{CommandUtil, DataUtil, GeminiUtil, ServicesUtil, StatusUtil};
use crate::pcs::PcsUpdater;
use crate::services::Services;
use crate::status::{BusStatusSender, LogStatusSender, StatusDatabase, StatusSender};
use crate::tcs::TcsFetcher;

use std::sync::Arc;

use giapi_bus::Broker;
use tracing::{info, warn};

struct Inner {
    config: GiapiConfig,
    manager: Arc<ConnectionManager>,
    status_database: StatusDatabase,
    status_sender: Arc<dyn StatusSender>,
    commands: Arc<CommandRegistry>,
    completion: CompletionInfoSender,
    epics: Arc<EpicsRegistry>,
    epics_fetcher: EpicsFetcher,
    tcs: TcsFetcher,
    pcs: PcsUpdater,
    data: DataEventPublisher,
    services: Services,
}

/// Connection, registries and producers shared by all façades.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct Giapi {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Giapi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Giapi")
            .field("manager", &self.inner.manager)
            .field("status_items", &self.inner.status_database.len())
            .finish_non_exhaustive()
    }
}

impl Giapi {
    /// Builds the context without touching the bus.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, config: GiapiConfig) -> Self {
        let manager = ConnectionManager::new(broker, config.connection.clone());

        let status_sender: Arc<dyn StatusSender> = match config.status.sender {
            StatusSenderKind::Bus => Arc::new(BusStatusSender::new(manager.clone())),
            StatusSenderKind::Log => Arc::new(LogStatusSender),
        };

        let inner = Inner {
            status_database: StatusDatabase::new(),
            status_sender,
            commands: CommandRegistry::new(manager.clone()),
            completion: CompletionInfoSender::new(manager.clone()),
            epics: EpicsRegistry::new(manager.clone(), config.epics.init_timeout),
            epics_fetcher: EpicsFetcher::new(manager.clone()),
            tcs: TcsFetcher::new(manager.clone()),
            pcs: PcsUpdater::new(manager.clone()),
            data: DataEventPublisher::new(manager.clone()),
            services: Services::new(manager.clone()),
            manager,
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Builds the context, connects and fetches the EPICS channel list.
    ///
    /// A missing channel list is not fatal; it is fetched again on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] when the GMP cannot be reached.
    pub async fn connect(broker: Arc<dyn Broker>, config: GiapiConfig) -> Result<Self> {
        let giapi = Self::new(broker, config);
        giapi.inner.manager.get_connection().await?;

        let timeout = giapi.inner.config.epics.init_timeout;
        if !giapi.inner.epics.configuration().init(timeout).await? {
            warn!("EPICS channel list not available yet");
        }

        info!("GIAPI client ready");
        Ok(giapi)
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &GiapiConfig {
        &self.inner.config
    }

    /// The connection manager.
    #[must_use]
    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.inner.manager
    }

    /// The status database.
    #[must_use]
    pub fn status_database(&self) -> &StatusDatabase {
        &self.inner.status_database
    }

    /// The status sender selected by the configuration.
    #[must_use]
    pub fn status_sender(&self) -> &Arc<dyn StatusSender> {
        &self.inner.status_sender
    }

    /// The command subscriptions.
    #[must_use]
    pub fn command_registry(&self) -> &Arc<CommandRegistry> {
        &self.inner.commands
    }

    /// The EPICS subscriptions.
    #[must_use]
    pub fn epics_registry(&self) -> &Arc<EpicsRegistry> {
        &self.inner.epics
    }

    pub(crate) fn completion(&self) -> &CompletionInfoSender {
        &self.inner.completion
    }

    pub(crate) fn epics_fetcher(&self) -> &EpicsFetcher {
        &self.inner.epics_fetcher
    }

    pub(crate) fn tcs(&self) -> &TcsFetcher {
        &self.inner.tcs
    }

    pub(crate) fn pcs(&self) -> &PcsUpdater {
        &self.inner.pcs
    }

    pub(crate) fn data_events(&self) -> &DataEventPublisher {
        &self.inner.data
    }

    pub(crate) fn services_client(&self) -> &Services {
        &self.inner.services
    }

    /// Sequence command subscriptions and completion info.
    #[must_use]
    pub const fn command(&self) -> CommandUtil<'_> {
        CommandUtil::new(self)
    }

    /// Status items.
    #[must_use]
    pub const fn status(&self) -> StatusUtil<'_> {
        StatusUtil::new(self)
    }

    /// EPICS, PCS and TCS.
    #[must_use]
    pub const fn gemini(&self) -> GeminiUtil<'_> {
        GeminiUtil::new(self)
    }

    /// Data events.
    #[must_use]
    pub const fn data(&self) -> DataUtil<'_> {
        DataUtil::new(self)
    }

    /// Observatory services.
    #[must_use]
    pub const fn services(&self) -> ServicesUtil<'_> {
        ServicesUtil::new(self)
    }

    /// Releases every subscription and producer, then closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Communication`] if the connection refuses to
    /// close.
    pub async fn close(&self) -> Result<()> {
        let inner = &self.inner;
        inner.commands.close().await;
        inner.epics.close().await;
        inner.status_sender.close().await;
        inner.completion.close().await;
        inner.epics_fetcher.close().await;
        inner.tcs.close().await;
        inner.pcs.close().await;
        inner.data.close().await;
        inner.services.close().await;
        inner.manager.close().await
    }
}
