//! Error types for the cloud link

use std::collections::TryReserveError;
use thiserror::Error;

/// Failure reported by an external collaborator (modem, LTE link, cloud client)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The operation needs an active cloud connection
    #[error("Not connected")]
    NotConnected,

    /// The collaborator rejected the call with a status code
    #[error("{operation} failed with status {status}")]
    Status { operation: &'static str, status: i32 },

    /// The collaborator is not available
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn status(operation: &'static str, status: i32) -> Self {
        Self::Status { operation, status }
    }
}

/// Fatal link errors
///
/// Only the one-time setup steps produce these; every other failure is
/// absorbed by the supervisor and retried.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Modem setup failed: {0}")]
    ModemInit(#[source] BackendError),

    #[error("Cloud library setup failed: {0}")]
    CloudInit(#[source] BackendError),

    #[error("Network setup failed: {0}")]
    NetworkSetup(#[source] BackendError),

    /// Cloud did not become ready in time; handled inside the supervisor
    #[error("Cloud did not become ready")]
    ReadyTimeout,

    /// A required builder field was not supplied
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Outbound enqueue failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("Outgoing message queue is full")]
    QueueFull,

    #[error("Out of memory while copying message")]
    OutOfMemory,

    /// The consumer side has been dropped
    #[error("Outgoing message queue is closed")]
    Closed,
}

impl From<TryReserveError> for EnqueueError {
    fn from(_: TryReserveError) -> Self {
        EnqueueError::OutOfMemory
    }
}

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;
