//! Agent configuration
//!
//! Link timing lives in [`cloud_link::LinkConfig`]; this covers the agent's own
//! workers, the simulated collaborators and logging.
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | HEARTBEAT_INTERVAL_SECONDS | 60 | Period of the heartbeat producer |
//! | SIM_ATTACH_DELAY_SECONDS | 5 | Simulated time to register on the network |
//! | SIM_FAIL_FIRST_CONNECTS | 0 | Simulated cloud connects that fail first |
//! | LOG_LEVEL | info | Log filter directive |
//! | LOG_JSON | false | Emit logs as JSON |
//! | LOG_DIR | (unset) | Write daily rolling log files here if the directory exists |

use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub heartbeat_interval: Duration,
    pub sim_attach_delay: Duration,
    pub sim_fail_first_connects: usize,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(60),
            sim_attach_delay: Duration::from_secs(5),
            sim_fail_first_connects: 0,
            log_level: "info".into(),
            log_json: false,
            log_dir: None,
        }
    }
}

impl AgentConfig {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            heartbeat_interval: std::env::var("HEARTBEAT_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_interval),
            sim_attach_delay: std::env::var("SIM_ATTACH_DELAY_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.sim_attach_delay),
            sim_fail_first_connects: std::env::var("SIM_FAIL_FIRST_CONNECTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sim_fail_first_connects),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_json),
            log_dir: std::env::var("LOG_DIR").ok().map(PathBuf::from),
        }
    }

    /// Log directory, if configured and present on disk
    pub fn log_file_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref().filter(|dir| dir.is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = AgentConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(config.sim_fail_first_connects, 0);
        assert_eq!(config.log_level, "info");
        assert!(config.log_file_dir().is_none());
    }

    #[test]
    fn test_log_dir_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = AgentConfig {
            log_dir: Some(dir.path().to_path_buf()),
            ..AgentConfig::default()
        };
        assert_eq!(config.log_file_dir(), Some(dir.path()));

        config.log_dir = Some(dir.path().join("missing"));
        assert!(config.log_file_dir().is_none());
    }
}
