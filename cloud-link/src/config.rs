//! Link configuration
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | CLOUD_CONNECTION_RETRY_TIMEOUT_SECONDS | 30 | Wait per transport connect attempt |
//! | CLOUD_READY_TIMEOUT_SECONDS | 600 | Wait for the session to become ready |
//! | CLOUD_RESET_COOLDOWN_SECONDS | 20 | Settle time before clearing cloud flags |
//! | CLOUD_CONNECTION_REESTABLISH_DELAY_SECONDS | 10 | Pause between connection cycles |
//! | MAX_OUTGOING_MESSAGES | 25 | Outbound queue capacity (1 to 1024) |
//! | POWER_SAVING_MODE_ENABLE | false | Request PSM before attaching |
//! | LED_VERBOSE_INDICATION | true | Show the waiting pattern on every cycle |
//! | APP_VERSION | crate version | Version reported to the cloud library |

use std::time::Duration;

/// Upper bound for the outbound queue capacity
pub const MAX_QUEUE_CAPACITY: usize = 1024;

/// Timing and capacity settings for the connection supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// How long each transport connect attempt may take before retrying
    pub retry_timeout: Duration,
    /// How long a connected transport may take to become ready
    pub ready_timeout: Duration,
    /// Delay before cloud flags are cleared during a reset
    pub reset_cooldown: Duration,
    /// Delay between the end of one cycle and the next network wait
    pub reestablish_delay: Duration,
    /// Outbound queue capacity
    pub queue_capacity: usize,
    /// Request power saving mode during network setup
    pub power_saving_mode: bool,
    /// Show the waiting indication before every network wait, not just at boot
    pub verbose_indication: bool,
    /// Application version reported when initializing the cloud library
    pub application_version: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            retry_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(600),
            reset_cooldown: Duration::from_secs(20),
            reestablish_delay: Duration::from_secs(10),
            queue_capacity: 25,
            power_saving_mode: false,
            verbose_indication: true,
            application_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl LinkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from `lookup`, falling back to defaults
    ///
    /// Durations must be whole seconds above zero. The queue capacity must lie
    /// in `1..=MAX_QUEUE_CAPACITY`. Anything else keeps the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let secs = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
        };
        let flag = |key: &str| lookup(key).and_then(|v| v.trim().parse::<bool>().ok());

        Self {
            retry_timeout: secs("CLOUD_CONNECTION_RETRY_TIMEOUT_SECONDS")
                .unwrap_or(defaults.retry_timeout),
            ready_timeout: secs("CLOUD_READY_TIMEOUT_SECONDS").unwrap_or(defaults.ready_timeout),
            reset_cooldown: secs("CLOUD_RESET_COOLDOWN_SECONDS")
                .unwrap_or(defaults.reset_cooldown),
            reestablish_delay: secs("CLOUD_CONNECTION_REESTABLISH_DELAY_SECONDS")
                .unwrap_or(defaults.reestablish_delay),
            queue_capacity: lookup("MAX_OUTGOING_MESSAGES")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|capacity| (1..=MAX_QUEUE_CAPACITY).contains(capacity))
                .unwrap_or(defaults.queue_capacity),
            power_saving_mode: flag("POWER_SAVING_MODE_ENABLE")
                .unwrap_or(defaults.power_saving_mode),
            verbose_indication: flag("LED_VERBOSE_INDICATION")
                .unwrap_or(defaults.verbose_indication),
            application_version: lookup("APP_VERSION").unwrap_or(defaults.application_version),
        }
    }

    pub fn with_retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = timeout;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_reset_cooldown(mut self, cooldown: Duration) -> Self {
        self.reset_cooldown = cooldown;
        self
    }

    pub fn with_reestablish_delay(mut self, delay: Duration) -> Self {
        self.reestablish_delay = delay;
        self
    }

    /// Set the outbound queue capacity, clamped to `1..=MAX_QUEUE_CAPACITY`
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.clamp(1, MAX_QUEUE_CAPACITY);
        self
    }

    pub fn with_power_saving_mode(mut self, enabled: bool) -> Self {
        self.power_saving_mode = enabled;
        self
    }

    pub fn with_verbose_indication(mut self, enabled: bool) -> Self {
        self.verbose_indication = enabled;
        self
    }

    pub fn with_application_version(mut self, version: impl Into<String>) -> Self {
        self.application_version = version.into();
        self
    }
}
