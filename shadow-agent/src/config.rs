//! Configuration loading for shadow-agent.
//!
//! Configuration is loaded from a TOML file (default: `agent.toml`). Every
//! section and field is optional.

use shadow_client::{
    CoordinatorConfig, EngineConfig, Heartbeat, SessionPolicy, TimeSyncPolicy,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for shadow-agent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Shadow engine configuration.
    #[serde(default)]
    pub engine: EngineSection,
    /// Optional per-cycle device message.
    #[serde(default)]
    pub heartbeat: Option<HeartbeatSection>,
    /// Provisioning configuration.
    #[serde(default)]
    pub provisioning: ProvisioningSection,
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkSection,
}

/// Shadow engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Seconds between polls (default: 3420 = 57 minutes). Must be non-zero.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Delta receive buffer in bytes (default: 1024).
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// `persistent` keeps the cloud session open, `per-cycle` closes it
    /// after every poll (default: persistent).
    #[serde(default)]
    pub session: SessionMode,
}

/// Session handling between polls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Keep the session open.
    #[default]
    Persistent,
    /// Close the session after every poll.
    PerCycle,
}

/// Device message sent after every poll.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatSection {
    /// Application endpoint (default: "custom").
    #[serde(default = "default_app_id")]
    pub app_id: String,
    /// Message body.
    pub message: String,
    /// Request delivery confirmation (default: false).
    #[serde(default)]
    pub confirmable: bool,
}

/// Provisioning configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisioningSection {
    /// Run the provisioning client before the engine (default: true).
    #[serde(default = "default_provisioning_enabled")]
    pub enabled: bool,
    /// Seconds between network time queries after reconnecting (default: 10).
    #[serde(default = "default_time_poll_secs")]
    pub time_poll_interval_secs: u64,
    /// Stop waiting for network time after this many attempts.
    /// Unset waits forever.
    pub max_time_attempts: Option<u32>,
}

/// Network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSection {
    /// Capacity of the modem/provisioning event queue (default: 16).
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
    /// Registration reported by the simulated modem (default: home).
    #[serde(default)]
    pub registration: Registration,
}

/// Simulated registration outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Registration {
    /// Registered on the home network.
    #[default]
    Home,
    /// Registered while roaming.
    Roaming,
}

// Default value functions
fn default_poll_interval_secs() -> u64 {
    57 * 60
}

fn default_buffer_capacity() -> usize {
    1024
}

fn default_app_id() -> String {
    "custom".to_string()
}

fn default_provisioning_enabled() -> bool {
    true
}

fn default_time_poll_secs() -> u64 {
    10
}

fn default_event_queue_depth() -> usize {
    16
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            buffer_capacity: default_buffer_capacity(),
            session: SessionMode::default(),
        }
    }
}

impl Default for ProvisioningSection {
    fn default() -> Self {
        Self {
            enabled: default_provisioning_enabled(),
            time_poll_interval_secs: default_time_poll_secs(),
            max_time_attempts: None,
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            event_queue_depth: default_event_queue_depth(),
            registration: Registration::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate().map_err(|reason| ConfigError::InvalidValue {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Check values the coordinator cannot run with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.engine.poll_interval_secs == 0 {
            return Err("engine.poll_interval_secs must be greater than zero");
        }
        Ok(())
    }

    /// Build the coordinator settings.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let session_policy = match self.engine.session {
            SessionMode::Persistent => SessionPolicy::Persistent,
            SessionMode::PerCycle => SessionPolicy::PerCycle,
        };

        CoordinatorConfig {
            engine: EngineConfig {
                poll_interval: Duration::from_secs(self.engine.poll_interval_secs),
                buffer_capacity: self.engine.buffer_capacity,
                session_policy,
                heartbeat: self.heartbeat.as_ref().map(|h| Heartbeat {
                    app_id: h.app_id.clone(),
                    message: h.message.clone(),
                    confirmable: h.confirmable,
                }),
            },
            provisioning_enabled: self.provisioning.enabled,
            time_sync: TimeSyncPolicy {
                poll_interval: Duration::from_secs(self.provisioning.time_poll_interval_secs),
                max_attempts: self.provisioning.max_time_attempts,
            },
            event_queue_depth: self.network.event_queue_depth,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value parsed but cannot be used.
    #[error("invalid config file {path}: {reason}")]
    InvalidValue {
        /// Path to the configuration file.
        path: PathBuf,
        /// What is wrong.
        reason: &'static str,
    },
}
