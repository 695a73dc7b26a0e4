//! Cloud Link - cellular cloud connection supervision
//!
//! Synchronizes three asynchronously reported conditions (network attachment,
//! wall-clock time, cloud session readiness) into one ordered connection
//! protocol with automatic retry and recovery.
//!
//! ```text
//! ┌────────────┐ events ┌──────────────┐ post  ┌───────────────────┐
//! │ LTE / modem│───────►│              │──────►│                   │
//! │ cloud lib  │───────►│ EventAdapter │       │ ConnectionSignals │
//! │ clock      │───────►│              │       │  network / cloud  │
//! └────────────┘        └──────────────┘       │  time latch       │
//!       ▲                                      └───────────────────┘
//!       │ connect / disconnect                  wait ▲       ▲ wait
//!       │                                            │       │
//! ┌─────┴────────────────┐                     ┌─────┴──┐ ┌──┴──────┐
//! │ ConnectionSupervisor │─────────────────────┘        │ │CloudLink│
//! └──────────────────────┘                              │ └─────────┘
//! ```
//!
//! Build a link with [`CloudLink::builder`], spawn the returned
//! [`ConnectionSupervisor`], and consume the [`OutboundReceiver`] in a
//! dispatcher task.

pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod flags;
pub mod hook;
pub mod link;
pub mod queue;
pub mod state;
pub mod supervisor;

pub use backend::memory::MemoryBackend;
pub use backend::{
    Backends, CloudClient, CloudInitParams, DateTimeService, FotaObserver, IndicatorPattern,
    LteLink, ModemInit, ModemLibrary, StatusIndicator,
};
pub use config::{LinkConfig, MAX_QUEUE_CAPACITY};
pub use error::{BackendError, EnqueueError, LinkError, LinkResult};
pub use events::{CloudEventListener, EventAdapter, NetworkEventListener, TimeEventListener};
pub use flags::{
    CloudFlags, ConnectionSignals, FlagSet, Latch, Match, NetworkFlags, TimeFlags, WaitTimeout,
};
pub use hook::{InboundHandler, InboundHook};
pub use link::{CloudLink, CloudLinkBuilder, DEFAULT_CAPABILITIES};
pub use queue::{Outbound, OutboundReceiver, OutboundSender, TryCopy, outbound_queue};
pub use state::{LinkState, StateTracker};
pub use supervisor::{ConnectionSupervisor, LinkStats, StatsSnapshot};
