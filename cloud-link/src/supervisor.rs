//! Connection supervisor
//!
//! Performs the one-time setup (modem, cloud library, network) and then keeps
//! the cloud session alive:
//!
//! ```text
//! loop:
//!   wait for network
//!   connect_cloud (retry until transport connects, then wait ready | disconnected)
//!   on success: publish capabilities, wait for disconnection
//!   reset_cloud (cooldown, best-effort disconnect, clear cloud flags)
//!   sleep reestablish_delay
//! ```
//!
//! Only setup failures end the supervisor. Connect failures, readiness
//! timeouts and disconnections are logged and retried.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

use crate::backend::{Backends, CloudInitParams, IndicatorPattern, ModemInit};
use crate::config::LinkConfig;
use crate::error::{BackendError, LinkError, LinkResult};
use crate::events::EventAdapter;
use crate::flags::{CloudFlags, ConnectionSignals, Match, NetworkFlags, WaitTimeout};
use crate::state::{LinkState, StateTracker};
use shared::{DeviceStatus, ServiceInfo};

/// Counters for supervisor activity
#[derive(Debug, Default)]
pub struct LinkStats {
    connect_attempts: AtomicU64,
    sessions: AtomicU64,
    resets: AtomicU64,
    cycles: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Cloud connect requests issued
    pub connect_attempts: u64,
    /// Sessions that reached ready
    pub sessions: u64,
    pub resets: u64,
    /// Network waits started
    pub cycles: u64,
}

impl LinkStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub struct ConnectionSupervisor {
    config: LinkConfig,
    signals: Arc<ConnectionSignals>,
    adapter: Arc<EventAdapter>,
    backends: Backends,
    capabilities: ServiceInfo,
    state: Arc<StateTracker>,
    stats: Arc<LinkStats>,
}

impl ConnectionSupervisor {
    pub(crate) fn new(
        config: LinkConfig,
        adapter: Arc<EventAdapter>,
        backends: Backends,
        capabilities: ServiceInfo,
        state: Arc<StateTracker>,
        stats: Arc<LinkStats>,
    ) -> Self {
        Self {
            config,
            signals: adapter.signals().clone(),
            adapter,
            backends,
            capabilities,
            state,
            stats,
        }
    }

    /// Set up the collaborators, then supervise the connection until `shutdown`
    /// is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the failing setup step. The failure pattern is shown before
    /// returning.
    pub async fn run(self, shutdown: CancellationToken) -> LinkResult<()> {
        self.backends.indicator.show(IndicatorPattern::Waiting);

        if let Err(e) = self.setup().await {
            tracing::error!(error = %e, "Fatal: connection setup failed");
            self.backends.indicator.show(IndicatorPattern::Failure);
            return Err(e);
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Connection supervisor stopped");
                Ok(())
            }
            never = self.supervise() => match never {},
        }
    }

    // ========== Setup ==========

    async fn setup(&self) -> LinkResult<()> {
        tracing::info!("Setting up modem...");
        self.setup_modem().await.map_err(LinkError::ModemInit)?;

        // Initialized once; the cloud library never needs a re-init
        tracing::info!("Setting up cloud library...");
        self.backends
            .cloud
            .init(CloudInitParams {
                listener: self.adapter.clone(),
                application_version: self.config.application_version.clone(),
            })
            .await
            .map_err(LinkError::CloudInit)?;

        // The network layer reconnects on its own after this
        tracing::info!("Setting up network...");
        self.setup_network().await.map_err(LinkError::NetworkSetup)?;

        tracing::info!("Connecting to network. This may take several minutes...");
        Ok(())
    }

    async fn setup_modem(&self) -> Result<(), BackendError> {
        match self.backends.modem.init().await? {
            ModemInit::Ready => {}
            ModemInit::FirmwareUpdated => {
                tracing::info!("Modem firmware update successful");
            }
            ModemInit::FirmwareUpdateFailed(code) => {
                tracing::error!(code, "Modem firmware update failed");
            }
        }

        self.backends.clock.register_handler(self.adapter.clone());
        Ok(())
    }

    async fn setup_network(&self) -> Result<(), BackendError> {
        let lte = &self.backends.lte;

        if self.config.power_saving_mode {
            tracing::info!("Requesting PSM mode");
            lte.request_psm(true).await?;
        }

        lte.enable_modem_events().await?;
        lte.init_and_connect_async(self.adapter.clone()).await
    }

    // ========== Steady state ==========

    async fn supervise(&self) -> Infallible {
        loop {
            LinkStats::bump(&self.stats.cycles);

            tracing::info!("Waiting for connection to network...");
            if self.config.verbose_indication {
                self.backends.indicator.show(IndicatorPattern::Waiting);
            }

            self.signals
                .network()
                .wait(NetworkFlags::ATTACHED, Match::All, WaitTimeout::Forever)
                .await;
            tracing::info!("Connected to network");

            match self.connect_cloud().await {
                Ok(()) => {
                    self.publish_capabilities().await;

                    self.signals
                        .cloud()
                        .wait(CloudFlags::DISCONNECTED, Match::All, WaitTimeout::Forever)
                        .await;
                    tracing::info!("Disconnected from cloud");
                }
                Err(e) => {
                    tracing::info!(error = %e, "Failed to connect to cloud");
                }
            }

            self.reset_cloud().await;

            tokio::time::sleep(self.config.reestablish_delay).await;
        }
    }

    /// Connect the transport, retrying every `retry_timeout`, then wait for
    /// the session to become ready.
    async fn connect_cloud(&self) -> LinkResult<()> {
        self.state.transition(LinkState::Connecting);
        tracing::info!("Connecting to cloud...");

        loop {
            let attempt = LinkStats::bump(&self.stats.connect_attempts);
            tracing::info!(
                attempt,
                retry_in_secs = self.config.retry_timeout.as_secs(),
                "Requesting cloud connection"
            );

            if let Err(e) = self.backends.cloud.connect().await {
                tracing::error!(error = %e, "Cloud connect request failed");
            }

            let connected = self
                .signals
                .cloud()
                .wait(
                    CloudFlags::CONNECTED,
                    Match::All,
                    WaitTimeout::After(self.config.retry_timeout),
                )
                .await;
            if !connected.is_empty() {
                break;
            }
        }
        self.state.transition(LinkState::Connected);

        // A disconnect arriving first ends the wait early
        let outcome = self
            .signals
            .cloud()
            .wait(
                CloudFlags::READY | CloudFlags::DISCONNECTED,
                Match::Any,
                WaitTimeout::After(self.config.ready_timeout),
            )
            .await;
        if outcome != CloudFlags::READY {
            tracing::info!(?outcome, "Cloud failed to become ready. Resetting connection.");
            self.reset_cloud().await;
            return Err(LinkError::ReadyTimeout);
        }

        self.state.transition(LinkState::Ready);
        let session = LinkStats::bump(&self.stats.sessions);
        tracing::info!(session, "Connected to cloud");
        Ok(())
    }

    /// Settle, disconnect and clear the cloud flags for the next cycle
    async fn reset_cloud(&self) {
        self.state.transition(LinkState::Disconnecting);
        LinkStats::bump(&self.stats.resets);

        tracing::info!("Disconnecting from cloud");
        tokio::time::sleep(self.config.reset_cooldown).await;

        match self.backends.cloud.disconnect().await {
            Ok(()) => tracing::info!("Successfully disconnected from cloud"),
            Err(BackendError::NotConnected) => {
                tracing::info!("Cannot disconnect from cloud because it is not connected");
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot disconnect from cloud, continuing anyway");
            }
        }

        let cleared = self.signals.reset_cloud_cycle();
        tracing::debug!(?cleared, "Cloud flags cleared");
        self.state.transition(LinkState::Disconnected);
    }

    /// Report supported services to the device shadow
    async fn publish_capabilities(&self) {
        let status = DeviceStatus::from_service_info(self.capabilities);
        match self.backends.cloud.update_device_status(&status).await {
            Ok(()) => tracing::info!("Device status published"),
            Err(e) => tracing::error!(error = %e, "Failed to publish device status"),
        }
    }
}

impl fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("config", &self.config)
            .field("state", &self.state.current())
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
