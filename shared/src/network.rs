//! LTE link events reported by the network layer
//!
//! Only [`NetworkEvent::RegistrationStatus`] drives the connection core; the
//! remaining variants carry radio parameters that are logged for diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

// ==================== Registration ====================

/// Network registration status as reported by the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    NotRegistered,
    RegisteredHome,
    Searching,
    RegistrationDenied,
    Unknown,
    RegisteredRoaming,
    RegisteredEmergency,
    UiccFail,
}

impl RegistrationStatus {
    /// Whether this status gives us a usable data connection.
    ///
    /// Emergency registration does not carry user data, so only home and
    /// roaming count.
    pub fn is_attached(self) -> bool {
        matches!(self, Self::RegisteredHome | Self::RegisteredRoaming)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRegistered => write!(f, "Not Registered"),
            Self::RegisteredHome => write!(f, "Registered Home"),
            Self::Searching => write!(f, "Searching"),
            Self::RegistrationDenied => write!(f, "Registration Denied"),
            Self::Unknown => write!(f, "Unknown"),
            Self::RegisteredRoaming => write!(f, "Registered Roaming"),
            Self::RegisteredEmergency => write!(f, "Registered Emergency"),
            Self::UiccFail => write!(f, "UICC Fail"),
        }
    }
}

// ==================== Radio Parameters ====================

/// Power saving mode parameters granted by the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsmConfig {
    /// Periodic tracking area update interval, seconds
    pub tau: i32,
    /// Active time before entering PSM, seconds
    pub active_time: i32,
}

/// Extended discontinuous reception parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdrxConfig {
    /// eDRX interval, seconds
    pub edrx: f32,
    /// Paging time window, seconds
    pub ptw: f32,
}

/// Serving cell identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellInfo {
    pub id: u32,
    /// Tracking area code
    pub tac: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RrcMode {
    Connected,
    Idle,
}

impl fmt::Display for RrcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Idle => write!(f, "Idle"),
        }
    }
}

/// Active LTE system mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LteMode {
    None,
    LteM,
    NbIot,
}

impl fmt::Display for LteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::LteM => write!(f, "LTE-M"),
            Self::NbIot => write!(f, "NB-IoT"),
        }
    }
}

/// Modem domain notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModemDomainEvent {
    LightSearchDone,
    SearchDone,
    ResetLoop,
    BatteryLow,
    Overheated,
}

impl fmt::Display for ModemDomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LightSearchDone => write!(f, "Light search done"),
            Self::SearchDone => write!(f, "Search done"),
            Self::ResetLoop => write!(f, "Reset loop detected"),
            Self::BatteryLow => write!(f, "Low battery"),
            Self::Overheated => write!(f, "Modem is overheated"),
        }
    }
}

// ==================== Events ====================

/// Event delivered by the LTE link layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NetworkEvent {
    RegistrationStatus(RegistrationStatus),
    PsmUpdate(PsmConfig),
    EdrxUpdate(EdrxConfig),
    RrcUpdate(RrcMode),
    CellUpdate(CellInfo),
    LteModeUpdate(LteMode),
    ModemEvent(ModemDomainEvent),
}

impl NetworkEvent {
    /// Registration status carried by this event, if any
    pub fn registration_status(&self) -> Option<RegistrationStatus> {
        match self {
            Self::RegistrationStatus(status) => Some(*status),
            _ => None,
        }
    }
}
