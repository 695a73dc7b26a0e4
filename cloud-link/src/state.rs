//! Explicit link state
//!
//! The flags decide what the supervisor waits for; this enum records where the
//! supervisor is in its cycle so observers and tests can check transitions.
//!
//! ```text
//! Disconnected ──► Connecting ──► Connected ──► Ready
//!      ▲                              │           │
//!      │                              ▼           ▼
//!      └────────────────────── Disconnecting ◄────┘
//! ```

use std::fmt;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    /// Transport connect requested, waiting for the transport
    Connecting,
    /// Transport up, waiting for the session to become ready
    Connected,
    Ready,
    /// Tearing down the session before the next cycle
    Disconnecting,
}

impl LinkState {
    /// Whether the supervisor may move from `self` to `next`
    pub fn can_transition_to(self, next: LinkState) -> bool {
        use LinkState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Disconnected, Disconnecting)
                | (Connecting, Connected)
                | (Connected, Ready)
                | (Connected, Disconnecting)
                | (Ready, Disconnecting)
                | (Disconnecting, Disconnected)
        )
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "Disconnected"),
            LinkState::Connecting => write!(f, "Connecting"),
            LinkState::Connected => write!(f, "Connected"),
            LinkState::Ready => write!(f, "Ready"),
            LinkState::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Holds the current [`LinkState`] and publishes changes
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<LinkState>,
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LinkState::Disconnected);
        Self { tx }
    }

    pub fn current(&self) -> LinkState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.tx.subscribe()
    }

    /// Move to `next`. Illegal transitions are refused and logged.
    pub(crate) fn transition(&self, next: LinkState) -> bool {
        let mut from = LinkState::Disconnected;
        let accepted = self.tx.send_if_modified(|current| {
            from = *current;
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });

        if accepted {
            tracing::info!(from = %from, to = %next, "Link state changed");
        } else {
            tracing::error!(from = %from, to = %next, "Refused illegal link state transition");
        }
        accepted
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
