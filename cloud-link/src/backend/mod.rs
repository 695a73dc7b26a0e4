//! Collaborator interfaces
//!
//! The modem library, the LTE link controller, the date-time service, the
//! cloud client and the status indicator are external subsystems. The link only
//! calls into them through these traits and receives their events through the
//! listener traits in [`crate::events`].
//!
//! [`memory`] provides in-process implementations for tests and simulation.

pub mod memory;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::BackendError;
use crate::events::{CloudEventListener, NetworkEventListener, TimeEventListener};
use shared::{DeviceMessage, DeviceStatus, FotaType};

/// Outcome of modem library initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemInit {
    Ready,
    /// A pending modem firmware update was applied during init
    FirmwareUpdated,
    /// A pending modem firmware update failed; the library is still usable
    FirmwareUpdateFailed(i32),
}

#[async_trait]
pub trait ModemLibrary: Send + Sync {
    async fn init(&self) -> Result<ModemInit, BackendError>;
}

/// Source of wall-clock time
pub trait DateTimeService: Send + Sync {
    fn register_handler(&self, listener: Arc<dyn TimeEventListener>);

    /// Whether the current time is trustworthy
    fn is_valid(&self) -> bool;
}

/// LTE link controller
#[async_trait]
pub trait LteLink: Send + Sync {
    async fn request_psm(&self, enable: bool) -> Result<(), BackendError>;

    async fn enable_modem_events(&self) -> Result<(), BackendError>;

    /// Start a persistent connection; registration changes are reported to
    /// `listener` for the rest of the process lifetime
    async fn init_and_connect_async(
        &self,
        listener: Arc<dyn NetworkEventListener>,
    ) -> Result<(), BackendError>;
}

/// Parameters for [`CloudClient::init`]
#[derive(Clone)]
pub struct CloudInitParams {
    pub listener: Arc<dyn CloudEventListener>,
    pub application_version: String,
}

impl fmt::Debug for CloudInitParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudInitParams")
            .field("application_version", &self.application_version)
            .finish_non_exhaustive()
    }
}

/// Cloud client library
///
/// `connect` and `disconnect` only start the operation; completion arrives as
/// a [`shared::CloudEvent`].
#[async_trait]
pub trait CloudClient: Send + Sync {
    async fn init(&self, params: CloudInitParams) -> Result<(), BackendError>;

    async fn connect(&self) -> Result<(), BackendError>;

    /// Returns [`BackendError::NotConnected`] if there was no session
    async fn disconnect(&self) -> Result<(), BackendError>;

    async fn update_device_status(&self, status: &DeviceStatus) -> Result<(), BackendError>;

    async fn send(&self, message: &DeviceMessage) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorPattern {
    /// Waiting for network or cloud
    Waiting,
    /// A one-time setup step failed
    Failure,
}

/// User-visible status feedback (LED or similar)
pub trait StatusIndicator: Send + Sync {
    fn show(&self, pattern: IndicatorPattern);
}

/// Notified when a FOTA image has been downloaded
pub trait FotaObserver: Send + Sync {
    fn on_fota_downloaded(&self, fota_type: FotaType);
}

/// The collaborators one link instance talks to
#[derive(Clone)]
pub struct Backends {
    pub modem: Arc<dyn ModemLibrary>,
    pub clock: Arc<dyn DateTimeService>,
    pub lte: Arc<dyn LteLink>,
    pub cloud: Arc<dyn CloudClient>,
    pub indicator: Arc<dyn StatusIndicator>,
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}
