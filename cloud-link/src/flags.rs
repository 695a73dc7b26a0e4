//! Condition flag store
//!
//! Three independent sets of sticky signals (network, cloud, time). Producers
//! post bits without blocking; waiters block until the bits they need are
//! present or a timeout elapses. Bits stay set until an explicit clear, so a
//! waiter that arrives after a post still observes it.
//!
//! ```text
//! EventAdapter ──post──► FlagSet<F> (watch<F>) ◄──wait── ConnectionSupervisor
//!                              ▲                        ◄──wait── CloudLink users
//!                              └──clear_all── supervisor only
//! ```

use bitflags::{Flags, bitflags};
use parking_lot::{RwLock, RwLockReadGuard};
use std::fmt;
use std::ops::BitAnd;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

bitflags! {
    /// Network condition
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NetworkFlags: u32 {
        /// Registered on a home or roaming network
        const ATTACHED = 1 << 1;
    }
}

bitflags! {
    /// Cloud session condition
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CloudFlags: u32 {
        /// Transport established
        const CONNECTED = 1 << 1;
        /// Session usable for device messages
        const READY = 1 << 2;
        /// The cloud asked for the device to be added to a user account
        const ASSOCIATION_REQUESTED = 1 << 3;
        /// Disconnection detected or requested; triggers a full reset
        const DISCONNECTED = 1 << 4;
    }
}

bitflags! {
    /// Wall-clock condition
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TimeFlags: u32 {
        const KNOWN = 1 << 1;
    }
}

/// Bitmask types usable in a [`FlagSet`]
pub trait Signal:
    Flags + Copy + fmt::Debug + Send + Sync + BitAnd<Output = Self> + 'static
{
}

impl<T> Signal for T where
    T: Flags + Copy + fmt::Debug + Send + Sync + BitAnd<Output = T> + 'static
{
}

/// How a wait mask is matched against the current bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Every bit of the mask must be set
    All,
    /// At least one bit of the mask must be set
    Any,
}

impl Match {
    fn is_satisfied<F: Signal>(self, current: F, mask: F) -> bool {
        match self {
            Match::All => current.contains(mask),
            Match::Any => current.intersects(mask),
        }
    }
}

/// How long a wait may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    /// Check once and return
    NoWait,
    After(Duration),
    Forever,
}

impl WaitTimeout {
    pub fn from_secs(secs: u64) -> Self {
        Duration::from_secs(secs).into()
    }
}

impl From<Duration> for WaitTimeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            WaitTimeout::NoWait
        } else {
            WaitTimeout::After(duration)
        }
    }
}

// ============================================================================
// FlagSet
// ============================================================================

/// A set of sticky boolean signals with blocking waits
///
/// Posting and clearing are crate-private: only the event adapters and the
/// supervisor write flags.
pub struct FlagSet<F: Signal> {
    name: &'static str,
    tx: watch::Sender<F>,
}

impl<F: Signal> FlagSet<F> {
    pub fn new(name: &'static str) -> Self {
        let (tx, _rx) = watch::channel(F::empty());
        Self { name, tx }
    }

    /// Set bits. Never blocks; posting bits that are already set wakes nobody.
    pub(crate) fn post(&self, bits: F) {
        let changed = self.tx.send_if_modified(|current| {
            if current.contains(bits) {
                false
            } else {
                current.insert(bits);
                true
            }
        });
        if changed {
            tracing::trace!(set = self.name, posted = ?bits, "Flags posted");
        }
    }

    /// Reset every bit to zero, returning the bits that were set
    pub(crate) fn clear_all(&self) -> F {
        let previous = self.tx.send_replace(F::empty());
        tracing::trace!(set = self.name, cleared = ?previous, "Flags cleared");
        previous
    }

    /// Block until `mask` is satisfied under `mode` or the timeout elapses.
    ///
    /// Returns the satisfied bits of `mask`, or an empty set on timeout.
    pub async fn wait(&self, mask: F, mode: Match, timeout: WaitTimeout) -> F {
        let mut rx = self.tx.subscribe();
        let settled = async move {
            rx.wait_for(|current| mode.is_satisfied(*current, mask))
                .await
                .map(|current| *current & mask)
                .unwrap_or(F::empty())
        };

        match timeout {
            WaitTimeout::NoWait => self.matching(mask, mode),
            WaitTimeout::Forever => settled.await,
            WaitTimeout::After(limit) => tokio::time::timeout(limit, settled)
                .await
                .unwrap_or(F::empty()),
        }
    }

    /// Non-blocking check that every bit of `mask` is set
    pub fn query(&self, mask: F) -> bool {
        !self.matching(mask, Match::All).is_empty()
    }

    /// Current bits
    pub fn snapshot(&self) -> F {
        *self.tx.borrow()
    }

    fn matching(&self, mask: F, mode: Match) -> F {
        let current = self.snapshot();
        if mode.is_satisfied(current, mask) {
            current & mask
        } else {
            F::empty()
        }
    }
}

impl<F: Signal> fmt::Debug for FlagSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("name", &self.name)
            .field("bits", &self.snapshot())
            .finish()
    }
}

// ============================================================================
// Latch
// ============================================================================

/// One-way flag: once set it is never cleared
#[derive(Debug)]
pub struct Latch {
    inner: FlagSet<TimeFlags>,
}

impl Latch {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: FlagSet::new(name),
        }
    }

    pub(crate) fn set(&self) {
        self.inner.post(TimeFlags::KNOWN);
    }

    /// Wait for the latch; returns false on timeout
    pub async fn wait(&self, timeout: WaitTimeout) -> bool {
        !self
            .inner
            .wait(TimeFlags::KNOWN, Match::All, timeout)
            .await
            .is_empty()
    }

    pub fn is_set(&self) -> bool {
        self.inner.query(TimeFlags::KNOWN)
    }
}

// ============================================================================
// ConnectionSignals
// ============================================================================

/// The shared synchronization object of one link instance
///
/// Handed as `Arc<ConnectionSignals>` to the adapters, the supervisor and the
/// public handle. Event delivery holds the read side of `delivery` while it
/// updates flags; clearing the cloud set takes the write side, so a clear never
/// interleaves with a half-applied event.
#[derive(Debug)]
pub struct ConnectionSignals {
    network: FlagSet<NetworkFlags>,
    cloud: FlagSet<CloudFlags>,
    time: Latch,
    delivery: RwLock<()>,
}

impl ConnectionSignals {
    pub fn new() -> Self {
        Self {
            network: FlagSet::new("network"),
            cloud: FlagSet::new("cloud"),
            time: Latch::new("time"),
            delivery: RwLock::new(()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn network(&self) -> &FlagSet<NetworkFlags> {
        &self.network
    }

    pub fn cloud(&self) -> &FlagSet<CloudFlags> {
        &self.cloud
    }

    pub fn time(&self) -> &Latch {
        &self.time
    }

    /// Hold for the duration of one inbound event
    pub(crate) fn begin_delivery(&self) -> RwLockReadGuard<'_, ()> {
        self.delivery.read()
    }

    /// Clear the cloud set once no event delivery is in flight
    pub(crate) fn reset_cloud_cycle(&self) -> CloudFlags {
        let _gate = self.delivery.write();
        self.cloud.clear_all()
    }

    /// Ask the supervisor to tear down the cloud session
    pub(crate) fn signal_disconnect(&self) {
        self.cloud.post(CloudFlags::DISCONNECTED);
    }
}

impl Default for ConnectionSignals {
    fn default() -> Self {
        Self::new()
    }
}
