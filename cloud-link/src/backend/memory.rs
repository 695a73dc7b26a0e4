//! In-process collaborators
//!
//! Behave like the real subsystems closely enough to drive the supervisor
//! through full connection cycles: the LTE link attaches after a delay, the
//! cloud client completes connects asynchronously and can be scripted to fail
//! the first attempts. Every call is recorded with a [`tokio::time::Instant`]
//! so tests running on paused time can check ordering and spacing.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use super::{
    Backends, CloudClient, CloudInitParams, DateTimeService, IndicatorPattern, LteLink,
    ModemInit, ModemLibrary, StatusIndicator,
};
use crate::error::BackendError;
use crate::events::{CloudEventListener, NetworkEventListener, TimeEventListener};
use shared::{CloudEvent, DeviceMessage, DeviceStatus, NetworkEvent, RegistrationStatus};

/// Status reported with a scripted connect failure (ETIMEDOUT)
pub const SIMULATED_CONNECT_ERROR: i32 = 116;

/// Entries kept per recorded history before the oldest are dropped
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Bounded, oldest-first record
#[derive(Debug)]
struct History<T> {
    entries: Mutex<VecDeque<T>>,
    limit: usize,
}

impl<T> History<T> {
    fn new(limit: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }

    fn push(&self, entry: T) {
        let mut entries = self.entries.lock();
        if entries.len() == self.limit {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    fn collect<R>(&self, f: impl FnMut(&T) -> Option<R>) -> Vec<R> {
        self.entries.lock().iter().filter_map(f).collect()
    }
}

/// Ordered record of the most recent collaborator calls
#[derive(Debug)]
pub struct CallLog<C> {
    calls: History<(C, Instant)>,
}

impl<C> Default for CallLog<C> {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }
}

impl<C> CallLog<C> {
    /// Keep at most `limit` calls
    pub fn with_limit(limit: usize) -> Self {
        Self {
            calls: History::new(limit),
        }
    }
}

impl<C: Clone + PartialEq> CallLog<C> {
    fn record(&self, call: C) {
        self.calls.push((call, Instant::now()));
    }

    pub fn calls(&self) -> Vec<C> {
        self.calls.collect(|(call, _)| Some(call.clone()))
    }

    pub fn count(&self, call: &C) -> usize {
        self.times(call).len()
    }

    /// When each occurrence of `call` happened
    pub fn times(&self, call: &C) -> Vec<Instant> {
        self.calls.collect(|(c, at)| (c == call).then_some(*at))
    }
}

// ============================================================================
// Modem
// ============================================================================

#[derive(Debug)]
pub struct MemoryModem {
    result: Result<ModemInit, BackendError>,
    inits: AtomicUsize,
}

impl MemoryModem {
    pub fn new() -> Self {
        Self::with_result(Ok(ModemInit::Ready))
    }

    pub fn with_result(result: Result<ModemInit, BackendError>) -> Self {
        Self {
            result,
            inits: AtomicUsize::new(0),
        }
    }

    pub fn init_count(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }
}

impl Default for MemoryModem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModemLibrary for MemoryModem {
    async fn init(&self) -> Result<ModemInit, BackendError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

// ============================================================================
// Clock
// ============================================================================

#[derive(Default)]
pub struct MemoryClock {
    valid: AtomicBool,
    listener: RwLock<Option<Arc<dyn TimeEventListener>>>,
}

impl MemoryClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    /// Obtain a trusted time and notify the registered handler
    pub fn acquire(&self) {
        self.set_valid(true);
        self.notify();
    }

    /// Send a time event with the current validity
    pub fn notify(&self) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_time_event(self);
        }
    }
}

impl DateTimeService for MemoryClock {
    fn register_handler(&self, listener: Arc<dyn TimeEventListener>) {
        *self.listener.write() = Some(listener);
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}

// ============================================================================
// LTE link
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LteCall {
    RequestPsm(bool),
    EnableModemEvents,
    Connect,
}

#[derive(Default)]
pub struct MemoryLte {
    calls: CallLog<LteCall>,
    attach_delay: Duration,
    fail_at: Option<(LteCall, BackendError)>,
    time_source: Option<Arc<MemoryClock>>,
    listener: RwLock<Option<Arc<dyn NetworkEventListener>>>,
}

impl MemoryLte {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register on the home network this long after the connect request
    pub fn with_attach_delay(mut self, delay: Duration) -> Self {
        self.attach_delay = delay;
        self
    }

    /// Make the matching setup call fail with `error`
    pub fn failing(mut self, call: LteCall, error: BackendError) -> Self {
        self.fail_at = Some((call, error));
        self
    }

    /// Acquire time on `clock` once attached, as network time does
    pub fn with_time_source(mut self, clock: Arc<MemoryClock>) -> Self {
        self.time_source = Some(clock);
        self
    }

    pub fn calls(&self) -> &CallLog<LteCall> {
        &self.calls
    }

    /// Report a registration change to the connected listener
    pub fn set_registration(&self, status: RegistrationStatus) {
        self.emit(&NetworkEvent::RegistrationStatus(status));
    }

    pub fn emit(&self, event: &NetworkEvent) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_network_event(event);
        }
    }

    fn check(&self, call: LteCall) -> Result<(), BackendError> {
        self.calls.record(call);
        match &self.fail_at {
            Some((failing, error)) if *failing == call => Err(error.clone()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl LteLink for MemoryLte {
    async fn request_psm(&self, enable: bool) -> Result<(), BackendError> {
        self.check(LteCall::RequestPsm(enable))
    }

    async fn enable_modem_events(&self) -> Result<(), BackendError> {
        self.check(LteCall::EnableModemEvents)
    }

    async fn init_and_connect_async(
        &self,
        listener: Arc<dyn NetworkEventListener>,
    ) -> Result<(), BackendError> {
        self.check(LteCall::Connect)?;
        *self.listener.write() = Some(listener.clone());

        let delay = self.attach_delay;
        let clock = self.time_source.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            listener.on_network_event(&NetworkEvent::RegistrationStatus(
                RegistrationStatus::RegisteredHome,
            ));
            if let Some(clock) = clock {
                clock.acquire();
            }
        });
        Ok(())
    }
}

// ============================================================================
// Cloud client
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    Init { application_version: String },
    Connect,
    Disconnect,
    UpdateDeviceStatus,
    Send,
}

/// Simulated cloud client
///
/// A connect request completes after `connect_latency` with
/// `TRANSPORT_CONNECTED` followed by `READY` (unless auto-ready is off).
/// The first `failed_connects` requests report a connect error instead.
pub struct MemoryCloud {
    calls: CallLog<CloudCall>,
    listener: RwLock<Option<Arc<dyn CloudEventListener>>>,
    connected: Arc<AtomicBool>,
    failures_left: AtomicUsize,
    connect_latency: Duration,
    auto_ready: bool,
    statuses: History<DeviceStatus>,
    sent: History<DeviceMessage>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self {
            calls: CallLog::default(),
            listener: RwLock::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            failures_left: AtomicUsize::new(0),
            connect_latency: Duration::from_millis(500),
            auto_ready: true,
            statuses: History::new(DEFAULT_HISTORY_LIMIT),
            sent: History::new(DEFAULT_HISTORY_LIMIT),
        }
    }

    /// Keep only the latest `limit` calls, statuses and sent messages
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.calls = CallLog::with_limit(limit);
        self.statuses = History::new(limit);
        self.sent = History::new(limit);
        self
    }

    pub fn with_failed_connects(mut self, count: usize) -> Self {
        self.failures_left = AtomicUsize::new(count);
        self
    }

    pub fn with_connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }

    /// Whether `READY` follows `TRANSPORT_CONNECTED` on its own
    pub fn with_auto_ready(mut self, enabled: bool) -> Self {
        self.auto_ready = enabled;
        self
    }

    pub fn calls(&self) -> &CallLog<CloudCall> {
        &self.calls
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn statuses(&self) -> Vec<DeviceStatus> {
        self.statuses.collect(|status| Some(status.clone()))
    }

    pub fn sent(&self) -> Vec<DeviceMessage> {
        self.sent.collect(|message| Some(message.clone()))
    }

    /// Deliver `event` to the cloud listener
    pub fn emit(&self, event: &CloudEvent) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_cloud_event(event);
        }
    }

    /// Simulate the server closing the session
    pub fn drop_connection(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.emit(&CloudEvent::TransportDisconnected);
        }
    }
}

impl Default for MemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudClient for MemoryCloud {
    async fn init(&self, params: CloudInitParams) -> Result<(), BackendError> {
        self.calls.record(CloudCall::Init {
            application_version: params.application_version,
        });
        *self.listener.write() = Some(params.listener);
        Ok(())
    }

    async fn connect(&self) -> Result<(), BackendError> {
        self.calls.record(CloudCall::Connect);
        let listener = self
            .listener
            .read()
            .clone()
            .ok_or_else(|| BackendError::Unavailable("cloud client not initialized".into()))?;

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();

        let connected = self.connected.clone();
        let latency = self.connect_latency;
        let auto_ready = self.auto_ready;
        tokio::spawn(async move {
            listener.on_cloud_event(&CloudEvent::TransportConnecting);
            tokio::time::sleep(latency).await;
            if failing {
                listener.on_cloud_event(&CloudEvent::TransportConnectError {
                    status: SIMULATED_CONNECT_ERROR,
                });
                return;
            }
            connected.store(true, Ordering::SeqCst);
            listener.on_cloud_event(&CloudEvent::TransportConnected);
            if auto_ready {
                listener.on_cloud_event(&CloudEvent::Ready);
            }
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BackendError> {
        self.calls.record(CloudCall::Disconnect);
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Err(BackendError::NotConnected);
        }
        self.emit(&CloudEvent::TransportDisconnected);
        Ok(())
    }

    async fn update_device_status(&self, status: &DeviceStatus) -> Result<(), BackendError> {
        self.calls.record(CloudCall::UpdateDeviceStatus);
        if !self.is_connected() {
            return Err(BackendError::NotConnected);
        }
        self.statuses.push(status.clone());
        Ok(())
    }

    async fn send(&self, message: &DeviceMessage) -> Result<(), BackendError> {
        self.calls.record(CloudCall::Send);
        if !self.is_connected() {
            return Err(BackendError::NotConnected);
        }
        self.sent.push(message.clone());
        Ok(())
    }
}

// ============================================================================
// Indicator
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryIndicator {
    shown: Mutex<Vec<IndicatorPattern>>,
}

impl MemoryIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patterns(&self) -> Vec<IndicatorPattern> {
        self.shown.lock().clone()
    }
}

impl StatusIndicator for MemoryIndicator {
    fn show(&self, pattern: IndicatorPattern) {
        tracing::debug!(?pattern, "Indicator");
        self.shown.lock().push(pattern);
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// A full set of in-process collaborators with typed access for assertions
#[derive(Clone)]
pub struct MemoryBackend {
    pub modem: Arc<MemoryModem>,
    pub clock: Arc<MemoryClock>,
    pub lte: Arc<MemoryLte>,
    pub cloud: Arc<MemoryCloud>,
    pub indicator: Arc<MemoryIndicator>,
}

impl MemoryBackend {
    /// Collaborators that attach after one second and connect on the first try
    pub fn new() -> Self {
        let clock = Arc::new(MemoryClock::new());
        Self {
            modem: Arc::new(MemoryModem::new()),
            lte: Arc::new(
                MemoryLte::new()
                    .with_attach_delay(Duration::from_secs(1))
                    .with_time_source(clock.clone()),
            ),
            clock,
            cloud: Arc::new(MemoryCloud::new()),
            indicator: Arc::new(MemoryIndicator::new()),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            modem: self.modem.clone(),
            clock: self.clock.clone(),
            lte: self.lte.clone(),
            cloud: self.cloud.clone(),
            indicator: self.indicator.clone(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}
