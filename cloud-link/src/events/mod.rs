//! Event adapters
//!
//! Collaborators report asynchronous conditions through one listener trait per
//! source. [`EventAdapter`] implements all three and turns the events into flag
//! updates on the shared [`ConnectionSignals`].
//!
//! Listener methods are synchronous and may be called from any thread or task.
//! Each call holds the delivery gate for its whole duration, so a cloud-cycle
//! reset never observes a half-applied event.

mod cloud;
mod network;
mod time;

use std::fmt;
use std::sync::Arc;

use crate::backend::{DateTimeService, FotaObserver};
use crate::flags::ConnectionSignals;
use crate::hook::InboundHook;
use shared::{CloudEvent, NetworkEvent};

/// Receives network layer events (registration, radio parameters)
pub trait NetworkEventListener: Send + Sync {
    fn on_network_event(&self, event: &NetworkEvent);
}

/// Receives cloud client events
pub trait CloudEventListener: Send + Sync {
    fn on_cloud_event(&self, event: &CloudEvent);
}

/// Receives time-acquisition notifications
///
/// The notifying service is passed in so the listener can check validity
/// synchronously inside the callback.
pub trait TimeEventListener: Send + Sync {
    fn on_time_event(&self, source: &dyn DateTimeService);
}

/// Translates collaborator events into condition flags
pub struct EventAdapter {
    signals: Arc<ConnectionSignals>,
    hook: Arc<InboundHook>,
    fota: Option<Arc<dyn FotaObserver>>,
}

impl EventAdapter {
    pub fn new(signals: Arc<ConnectionSignals>, hook: Arc<InboundHook>) -> Self {
        Self {
            signals,
            hook,
            fota: None,
        }
    }

    /// Forward completed FOTA downloads to `observer`
    pub fn with_fota_observer(mut self, observer: Arc<dyn FotaObserver>) -> Self {
        self.fota = Some(observer);
        self
    }

    pub fn signals(&self) -> &Arc<ConnectionSignals> {
        &self.signals
    }
}

impl fmt::Debug for EventAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventAdapter")
            .field("signals", &self.signals)
            .field("hook", &self.hook)
            .field("fota_observer", &self.fota.is_some())
            .finish()
    }
}
