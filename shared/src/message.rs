//! Outbound device messages
//!
//! The payload is kept as encoded bytes; building application payloads is the
//! producer's business.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of device message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Telemetry sample
    Data,
    /// Reply to a cloud request
    Response,
    /// Periodic liveness report
    Heartbeat,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => write!(f, "DATA"),
            Self::Response => write!(f, "RESPONSE"),
            Self::Heartbeat => write!(f, "HEARTBEAT"),
        }
    }
}

/// Message produced by the device for delivery to the cloud
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMessage {
    pub request_id: Uuid,
    /// Application identifier, e.g. "TEMP" or "GNSS"
    pub app_id: String,
    pub message_type: MessageType,
    /// Milliseconds since the Unix epoch, when the device knew the time
    pub timestamp_ms: Option<i64>,
    pub payload: Vec<u8>,
}

impl DeviceMessage {
    /// Create a message with an already encoded payload
    pub fn new(app_id: impl Into<String>, message_type: MessageType, payload: Vec<u8>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            app_id: app_id.into(),
            message_type,
            timestamp_ms: None,
            payload,
        }
    }

    /// Create a message whose payload is `data` encoded as JSON
    pub fn json<T: Serialize>(
        app_id: impl Into<String>,
        message_type: MessageType,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(app_id, message_type, serde_json::to_vec(data)?))
    }

    /// Stamp with the current wall-clock time
    pub fn stamped_now(mut self) -> Self {
        self.timestamp_ms = Some(Utc::now().timestamp_millis());
        self
    }

    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
