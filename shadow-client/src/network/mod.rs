//! Network stack abstraction.
//!
//! The [`NetworkStack`] trait hides the modem library so the coordinator can
//! run against real hardware or the [`MockModem`].

mod mock;

pub use mock::MockModem;

use async_trait::async_trait;
use shadow_core::{FunctionalMode, RegistrationStatus};
use thiserror::Error;

use crate::events::NetworkEventSink;

/// Radio resource control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrcMode {
    /// Radio link active.
    Connected,
    /// Radio link idle.
    Idle,
}

impl std::fmt::Display for RrcMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RrcMode::Connected => f.write_str("Connected"),
            RrcMode::Idle => f.write_str("Idle"),
        }
    }
}

/// Modem-level notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemEvent {
    /// A light network search finished.
    LightSearchDone,
    /// A full network search finished.
    SearchDone,
    /// The modem reset itself.
    Reset,
    /// Any other vendor event code.
    Other(i32),
}

/// Events emitted by the network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// Registration status changed.
    RegistrationStatus(RegistrationStatus),
    /// RRC mode changed.
    RrcModeChange(RrcMode),
    /// Serving cell changed.
    CellChange {
        /// Cell identifier.
        cell_id: u32,
        /// Tracking area code.
        tracking_area: u32,
    },
    /// Modem event.
    ModemEvent(ModemEvent),
}

/// Network errors.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// Modem library initialization failed.
    #[error("modem initialization failed: {0}")]
    InitFailed(String),

    /// Starting or re-establishing the connection failed.
    #[error("network connection failed: {0}")]
    ConnectFailed(String),

    /// Reading or setting the functional mode failed.
    #[error("functional mode change failed: {0}")]
    ModeFailed(String),
}

/// Cellular network stack.
#[async_trait]
pub trait NetworkStack: Send + Sync {
    /// Initialize the modem library.
    async fn initialize(&self) -> Result<(), ConnectivityError>;

    /// Start attaching in the background. Events go to `sink` from now on.
    async fn connect_async(&self, sink: NetworkEventSink) -> Result<(), ConnectivityError>;

    /// Reconnect and return once registered.
    async fn connect(&self) -> Result<(), ConnectivityError>;

    /// Current functional mode.
    async fn functional_mode(&self) -> Result<FunctionalMode, ConnectivityError>;

    /// Switch the functional mode.
    async fn set_functional_mode(&self, mode: FunctionalMode) -> Result<(), ConnectivityError>;
}
