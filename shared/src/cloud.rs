//! Events delivered by the cloud client library

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Firmware image kind of a completed FOTA job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FotaType {
    Application,
    ModemDelta,
    ModemFull,
    Bootloader,
    Invalid,
}

impl fmt::Display for FotaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => write!(f, "Application"),
            Self::ModemDelta => write!(f, "Modem (delta)"),
            Self::ModemFull => write!(f, "Modem (full)"),
            Self::Bootloader => write!(f, "Bootloader"),
            Self::Invalid => write!(f, "Invalid"),
        }
    }
}

/// Data received from the cloud
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundData {
    pub payload: Vec<u8>,
}

impl InboundData {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Parse the payload as JSON
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Cloud client event
///
/// `status` values are the client library's raw error codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CloudEvent {
    TransportConnecting,
    TransportConnected,
    TransportConnectError { status: i32 },
    /// The device must be added to a user account in the cloud portal
    UserAssociationRequest,
    /// Fired on every connection once the device belongs to an account
    UserAssociated,
    Ready,
    SensorDataAck,
    TransportDisconnected,
    Error { status: i32 },
    RxDataGeneral(InboundData),
    RxDataShadow(InboundData),
    FotaStart,
    FotaDone(FotaType),
    FotaError,
}

impl CloudEvent {
    /// Stable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::TransportConnecting => "TRANSPORT_CONNECTING",
            Self::TransportConnected => "TRANSPORT_CONNECTED",
            Self::TransportConnectError { .. } => "TRANSPORT_CONNECT_ERROR",
            Self::UserAssociationRequest => "USER_ASSOCIATION_REQUEST",
            Self::UserAssociated => "USER_ASSOCIATED",
            Self::Ready => "READY",
            Self::SensorDataAck => "SENSOR_DATA_ACK",
            Self::TransportDisconnected => "TRANSPORT_DISCONNECTED",
            Self::Error { .. } => "ERROR",
            Self::RxDataGeneral(_) => "RX_DATA_GENERAL",
            Self::RxDataShadow(_) => "RX_DATA_SHADOW",
            Self::FotaStart => "FOTA_START",
            Self::FotaDone(_) => "FOTA_DONE",
            Self::FotaError => "FOTA_ERROR",
        }
    }
}

impl fmt::Display for CloudEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
