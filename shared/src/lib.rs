//! Shared types for the cloud link
//!
//! The event vocabulary exchanged between the external subsystems (modem,
//! LTE link, cloud client) and the connection core, plus the outbound
//! device message and the capability report published after connecting.

pub mod capabilities;
pub mod cloud;
pub mod message;
pub mod network;

// Re-exports
pub use capabilities::{DeviceStatus, FotaInfo, ServiceInfo, UiInfo};
pub use cloud::{CloudEvent, FotaType, InboundData};
pub use message::{DeviceMessage, MessageType};
pub use network::{
    CellInfo, EdrxConfig, LteMode, ModemDomainEvent, NetworkEvent, PsmConfig, RegistrationStatus,
    RrcMode,
};
pub use serde::{Deserialize, Serialize};
