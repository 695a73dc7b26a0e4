//! Outbound device message queue
//!
//! A bounded queue between message producers and the component that sends to
//! the cloud. Producers never block: a full queue rejects the message and the
//! caller decides what to drop.
//!
//! Items either own an independent copy of the message or share the
//! producer's `Arc`. Dropping the item releases the copy or the reference.

use std::collections::TryReserveError;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::EnqueueError;
use crate::flags::WaitTimeout;
use shared::DeviceMessage;

/// Copy that reports allocation failure instead of aborting
pub trait TryCopy: Sized {
    fn try_copy(&self) -> Result<Self, TryReserveError>;
}

impl TryCopy for DeviceMessage {
    fn try_copy(&self) -> Result<Self, TryReserveError> {
        let mut app_id = String::new();
        app_id.try_reserve_exact(self.app_id.len())?;
        app_id.push_str(&self.app_id);

        let mut payload = Vec::new();
        payload.try_reserve_exact(self.payload.len())?;
        payload.extend_from_slice(&self.payload);

        Ok(DeviceMessage {
            request_id: self.request_id,
            app_id,
            message_type: self.message_type,
            timestamp_ms: self.timestamp_ms,
            payload,
        })
    }
}

/// A queued message
#[derive(Debug)]
pub enum Outbound<M> {
    /// Independent copy owned by the queue item
    Owned(M),
    /// Reference to the producer's message
    Shared(Arc<M>),
}

impl<M> Outbound<M> {
    pub fn is_copy(&self) -> bool {
        matches!(self, Outbound::Owned(_))
    }

    /// Free the copy or drop the shared reference
    pub fn release(self) {}
}

impl<M> Deref for Outbound<M> {
    type Target = M;

    fn deref(&self) -> &M {
        match self {
            Outbound::Owned(message) => message,
            Outbound::Shared(message) => message,
        }
    }
}

/// Create a queue holding at most `capacity` messages
pub fn outbound_queue<M>(capacity: usize) -> (OutboundSender<M>, OutboundReceiver<M>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (OutboundSender { tx }, OutboundReceiver { rx })
}

// ============================================================================
// Producer side
// ============================================================================

pub struct OutboundSender<M> {
    tx: mpsc::Sender<Outbound<M>>,
}

impl<M> Clone for OutboundSender<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M: TryCopy> OutboundSender<M> {
    /// Queue `message` without blocking.
    ///
    /// With `copy` the queue stores an independent copy; otherwise it stores a
    /// clone of the `Arc` and the producer's message lives until the item is
    /// consumed. A slot is reserved before anything is copied, so a full queue
    /// costs no allocation.
    pub fn enqueue(&self, message: &Arc<M>, copy: bool) -> Result<(), EnqueueError> {
        let permit = self.tx.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => {
                tracing::error!("Device message rejected, outgoing message queue is full");
                EnqueueError::QueueFull
            }
            TrySendError::Closed(()) => EnqueueError::Closed,
        })?;

        let item = if copy {
            Outbound::Owned(message.try_copy()?)
        } else {
            Outbound::Shared(Arc::clone(message))
        };

        tracing::debug!(copy, "Adding device message to queue");
        permit.send(item);
        Ok(())
    }
}

impl<M> OutboundSender<M> {
    /// Messages currently queued
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl<M> fmt::Debug for OutboundSender<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundSender")
            .field("queued", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

// ============================================================================
// Consumer side
// ============================================================================

pub struct OutboundReceiver<M> {
    rx: mpsc::Receiver<Outbound<M>>,
}

impl<M> OutboundReceiver<M> {
    /// Wait for the next message; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Outbound<M>> {
        self.rx.recv().await
    }

    /// Wait for the next message up to `timeout`
    pub async fn recv_timeout(&mut self, timeout: WaitTimeout) -> Option<Outbound<M>> {
        match timeout {
            WaitTimeout::NoWait => self.rx.try_recv().ok(),
            WaitTimeout::Forever => self.rx.recv().await,
            WaitTimeout::After(limit) => tokio::time::timeout(limit, self.rx.recv())
                .await
                .ok()
                .flatten(),
        }
    }
}

impl<M> fmt::Debug for OutboundReceiver<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutboundReceiver").finish_non_exhaustive()
    }
}
