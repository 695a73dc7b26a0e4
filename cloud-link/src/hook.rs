//! Application notification hook for inbound cloud data

use parking_lot::RwLock;
use shared::InboundData;
use std::fmt;
use std::sync::Arc;

/// Handler invoked for every general inbound message
///
/// Runs synchronously on the context that delivered the cloud event. Hand
/// heavy work off to a task or channel instead of blocking here.
pub type InboundHandler = Arc<dyn Fn(&InboundData) + Send + Sync>;

/// Holds at most one inbound handler; registering replaces the previous one
#[derive(Default)]
pub struct InboundHook {
    handler: RwLock<Option<InboundHandler>>,
}

impl InboundHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: InboundHandler) {
        let replaced = self.handler.write().replace(handler).is_some();
        if replaced {
            tracing::debug!("Inbound handler replaced");
        }
    }

    pub fn is_registered(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Pass `data` to the handler. Returns false when none is registered.
    pub fn invoke(&self, data: &InboundData) -> bool {
        // Clone out so the handler may re-register without deadlocking
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => {
                handler(data);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for InboundHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundHook")
            .field("registered", &self.is_registered())
            .finish()
    }
}
