//! Public link handle and builder

use std::sync::Arc;
use tokio::sync::watch;

use crate::backend::{Backends, FotaObserver};
use crate::config::LinkConfig;
use crate::error::{EnqueueError, LinkError, LinkResult};
use crate::events::EventAdapter;
use crate::flags::{CloudFlags, ConnectionSignals, Match, NetworkFlags, WaitTimeout};
use crate::hook::{InboundHandler, InboundHook};
use crate::queue::{OutboundReceiver, OutboundSender, outbound_queue};
use crate::state::{LinkState, StateTracker};
use crate::supervisor::{ConnectionSupervisor, LinkStats, StatsSnapshot};
use shared::{DeviceMessage, FotaInfo, ServiceInfo, UiInfo};

/// Services reported when none are configured
pub const DEFAULT_CAPABILITIES: ServiceInfo = ServiceInfo {
    fota: FotaInfo {
        application: true,
        bootloader: true,
        modem: true,
        modem_full: true,
    },
    ui: UiInfo {
        gnss: true,
        temperature: true,
        log: true,
        dictionary_log: true,
    },
};

// ============================================================================
// Handle
// ============================================================================

/// Handle for application code
///
/// Cheap to clone. Waits never start or stop the connection; they observe
/// what the supervisor and the adapters have signalled.
#[derive(Debug, Clone)]
pub struct CloudLink {
    signals: Arc<ConnectionSignals>,
    hook: Arc<InboundHook>,
    outbound: OutboundSender<DeviceMessage>,
    state: Arc<StateTracker>,
    stats: Arc<LinkStats>,
}

impl CloudLink {
    pub fn builder() -> CloudLinkBuilder {
        CloudLinkBuilder::new()
    }

    /// Wait until the device is registered on a home or roaming network
    pub async fn await_network(&self, timeout: impl Into<WaitTimeout>) -> bool {
        !self
            .signals
            .network()
            .wait(NetworkFlags::ATTACHED, Match::All, timeout.into())
            .await
            .is_empty()
    }

    /// Wait until the cloud session is ready. A disconnection does not end
    /// this wait.
    pub async fn await_cloud_ready(&self, timeout: impl Into<WaitTimeout>) -> bool {
        !self
            .signals
            .cloud()
            .wait(CloudFlags::READY, Match::All, timeout.into())
            .await
            .is_empty()
    }

    /// Wait for network and cloud readiness under one deadline
    pub async fn await_full_connection(&self, timeout: impl Into<WaitTimeout>) -> bool {
        let both = async {
            self.await_network(WaitTimeout::Forever).await
                && self.await_cloud_ready(WaitTimeout::Forever).await
        };

        match timeout.into() {
            WaitTimeout::NoWait => {
                self.signals.network().query(NetworkFlags::ATTACHED)
                    && self.signals.cloud().query(CloudFlags::READY)
            }
            WaitTimeout::Forever => both.await,
            WaitTimeout::After(limit) => tokio::time::timeout(limit, both).await.unwrap_or(false),
        }
    }

    pub async fn await_date_time_known(&self, timeout: impl Into<WaitTimeout>) -> bool {
        self.signals.time().wait(timeout.into()).await
    }

    pub fn is_date_time_known(&self) -> bool {
        self.signals.time().is_set()
    }

    pub fn is_cloud_connected(&self) -> bool {
        self.signals.cloud().query(CloudFlags::CONNECTED)
    }

    /// Whether a disconnection is pending in the current cycle
    pub fn is_cloud_disconnecting(&self) -> bool {
        self.signals.cloud().query(CloudFlags::DISCONNECTED)
    }

    /// Wait until the current session ends
    pub async fn await_cloud_disconnection(&self, timeout: impl Into<WaitTimeout>) -> bool {
        !self
            .signals
            .cloud()
            .wait(CloudFlags::DISCONNECTED, Match::All, timeout.into())
            .await
            .is_empty()
    }

    /// Ask the supervisor to tear down and reestablish the session
    pub fn request_disconnect(&self) {
        tracing::debug!("Cloud disconnect requested");
        self.signals.signal_disconnect();
    }

    /// Replace the handler for general inbound data
    pub fn register_inbound_handler(&self, handler: InboundHandler) {
        self.hook.register(handler);
    }

    /// Queue a device message for the outbound dispatcher
    ///
    /// See [`OutboundSender::enqueue`] for the meaning of `copy`.
    pub fn enqueue_outbound(
        &self,
        message: &Arc<DeviceMessage>,
        copy: bool,
    ) -> Result<(), EnqueueError> {
        self.outbound.enqueue(message, copy)
    }

    pub fn outbound(&self) -> &OutboundSender<DeviceMessage> {
        &self.outbound
    }

    pub fn state(&self) -> LinkState {
        self.state.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn signals(&self) -> &Arc<ConnectionSignals> {
        &self.signals
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a link from configuration and collaborators
///
/// # Example
///
/// ```no_run
/// use cloud_link::{CloudLink, LinkConfig, MemoryBackend};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo() -> Result<(), cloud_link::LinkError> {
/// let backend = MemoryBackend::new();
/// let (link, supervisor, _outbound) = CloudLink::builder()
///     .config(LinkConfig::from_env())
///     .backends(backend.backends())
///     .build()?;
///
/// tokio::spawn(supervisor.run(CancellationToken::new()));
/// link.await_full_connection(std::time::Duration::from_secs(60)).await;
/// # Ok(())
/// # }
/// ```
pub struct CloudLinkBuilder {
    config: LinkConfig,
    backends: Option<Backends>,
    capabilities: ServiceInfo,
    fota_observer: Option<Arc<dyn FotaObserver>>,
    signals: Option<Arc<ConnectionSignals>>,
}

impl Default for CloudLinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudLinkBuilder {
    pub fn new() -> Self {
        Self {
            config: LinkConfig::default(),
            backends: None,
            capabilities: DEFAULT_CAPABILITIES,
            fota_observer: None,
            signals: None,
        }
    }

    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the external collaborators (required)
    pub fn backends(mut self, backends: Backends) -> Self {
        self.backends = Some(backends);
        self
    }

    /// Services reported to the cloud once a session is ready
    pub fn capabilities(mut self, capabilities: ServiceInfo) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn fota_observer(mut self, observer: Arc<dyn FotaObserver>) -> Self {
        self.fota_observer = Some(observer);
        self
    }

    /// Use an existing signal object instead of creating one
    pub fn signals(mut self, signals: Arc<ConnectionSignals>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Build the handle, the supervisor to run, and the consumer end of the
    /// outbound queue.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Config` if no backends were supplied.
    pub fn build(
        self,
    ) -> LinkResult<(
        CloudLink,
        ConnectionSupervisor,
        OutboundReceiver<DeviceMessage>,
    )> {
        let backends = self
            .backends
            .ok_or_else(|| LinkError::Config("backends are required".into()))?;

        let signals = self.signals.unwrap_or_else(ConnectionSignals::shared);
        let hook = Arc::new(InboundHook::new());
        let state = Arc::new(StateTracker::new());
        let stats = Arc::new(LinkStats::default());
        let (outbound, receiver) = outbound_queue(self.config.queue_capacity);

        let mut adapter = EventAdapter::new(signals.clone(), hook.clone());
        if let Some(observer) = self.fota_observer {
            adapter = adapter.with_fota_observer(observer);
        }

        let supervisor = ConnectionSupervisor::new(
            self.config,
            Arc::new(adapter),
            backends,
            self.capabilities,
            state.clone(),
            stats.clone(),
        );

        let link = CloudLink {
            signals,
            hook,
            outbound,
            state,
            stats,
        };

        Ok((link, supervisor, receiver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use std::time::Duration;

    #[test]
    fn build_requires_backends() {
        let result = CloudLinkBuilder::new().build();
        assert!(matches!(result, Err(LinkError::Config(_))));
    }

    #[tokio::test]
    async fn fresh_link_reports_nothing() {
        let (link, _supervisor, _rx) = CloudLink::builder()
            .backends(MemoryBackend::new().backends())
            .build()
            .unwrap();

        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(!link.is_cloud_connected());
        assert!(!link.is_cloud_disconnecting());
        assert!(!link.await_full_connection(WaitTimeout::NoWait).await);
        assert_eq!(link.stats(), StatsSnapshot::default());
    }

    #[tokio::test]
    async fn request_disconnect_is_visible() {
        let (link, _supervisor, _rx) = CloudLink::builder()
            .backends(MemoryBackend::new().backends())
            .build()
            .unwrap();

        link.request_disconnect();
        assert!(link.is_cloud_disconnecting());
        assert!(link.await_cloud_disconnection(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn full_connection_needs_both_conditions() {
        let (link, _supervisor, _rx) = CloudLink::builder()
            .backends(MemoryBackend::new().backends())
            .build()
            .unwrap();

        link.signals().network().post(NetworkFlags::ATTACHED);
        assert!(!link.await_full_connection(Duration::from_secs(2)).await);

        link.signals().cloud().post(CloudFlags::READY);
        assert!(link.await_full_connection(Duration::from_secs(2)).await);
    }

    #[test]
    fn queue_uses_configured_capacity() {
        let (link, _supervisor, _rx) = CloudLink::builder()
            .config(LinkConfig::new().with_queue_capacity(3))
            .backends(MemoryBackend::new().backends())
            .build()
            .unwrap();

        assert_eq!(link.outbound().capacity(), 3);
    }
}
