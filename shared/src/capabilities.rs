//! Device capability report
//!
//! Published to the device shadow once a cloud session becomes ready, so the
//! portal knows which services (FOTA image types, UI cards) the device offers.

use serde::{Deserialize, Serialize};

/// FOTA image types the device accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FotaInfo {
    pub application: bool,
    pub bootloader: bool,
    /// Delta modem firmware updates
    pub modem: bool,
    pub modem_full: bool,
}

/// Portal UI cards the device feeds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiInfo {
    pub gnss: bool,
    pub temperature: bool,
    pub log: bool,
    pub dictionary_log: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub fota: FotaInfo,
    pub ui: UiInfo,
}

/// Device status shadow update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Modem details are filled in by the cloud client when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modem: Option<serde_json::Value>,
    pub svc: ServiceInfo,
}

impl DeviceStatus {
    pub fn from_service_info(svc: ServiceInfo) -> Self {
        Self { modem: None, svc }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_omits_missing_modem_info() {
        let status = DeviceStatus::from_service_info(ServiceInfo {
            fota: FotaInfo {
                application: true,
                ..Default::default()
            },
            ui: UiInfo {
                temperature: true,
                ..Default::default()
            },
        });

        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("modem").is_none());
        assert_eq!(json["svc"]["fota"]["application"], true);
        assert_eq!(json["svc"]["ui"]["gnss"], false);
    }
}
