//! Simulated device collaborators
//!
//! The agent runs the link against the in-memory backend. Indicator patterns
//! and downloaded FOTA images are reported through the log.

use std::sync::Arc;

use cloud_link::backend::memory::{MemoryClock, MemoryCloud, MemoryLte};
use cloud_link::{Backends, FotaObserver, IndicatorPattern, MemoryBackend, StatusIndicator};
use shared::FotaType;

use crate::config::AgentConfig;

/// Recorded calls and messages kept by the simulated cloud
const SIM_HISTORY_LIMIT: usize = 64;

/// In-memory collaborators scripted from `config`
///
/// The cloud keeps a bounded history since the agent runs indefinitely.
pub fn simulated_backend(config: &AgentConfig) -> MemoryBackend {
    let clock = Arc::new(MemoryClock::new());
    MemoryBackend {
        lte: Arc::new(
            MemoryLte::new()
                .with_attach_delay(config.sim_attach_delay)
                .with_time_source(clock.clone()),
        ),
        clock,
        cloud: Arc::new(
            MemoryCloud::new()
                .with_failed_connects(config.sim_fail_first_connects)
                .with_history_limit(SIM_HISTORY_LIMIT),
        ),
        ..MemoryBackend::new()
    }
}

/// `backend` with the indicator replaced by [`LogIndicator`]
pub fn agent_backends(backend: &MemoryBackend) -> Backends {
    Backends {
        indicator: Arc::new(LogIndicator),
        ..backend.backends()
    }
}

#[derive(Debug, Default)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn show(&self, pattern: IndicatorPattern) {
        match pattern {
            IndicatorPattern::Waiting => tracing::info!("LED: waiting"),
            IndicatorPattern::Failure => tracing::error!("LED: failure"),
        }
    }
}

#[derive(Debug, Default)]
pub struct LogFota;

impl FotaObserver for LogFota {
    fn on_fota_downloaded(&self, fota_type: FotaType) {
        tracing::info!(fota_type = %fota_type, "FOTA image downloaded, apply on next reboot");
    }
}
