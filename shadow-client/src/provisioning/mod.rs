//! Provisioning client abstraction and the modem mode-change handler.
//!
//! While provisioning, the client asks for the modem to go offline (to
//! write credentials) and back to normal. [`ModeSwitcher`] serves those
//! requests: going back to normal means reconnecting and then waiting until
//! the provisioning service can tell the time again.

mod mock;

pub use mock::MockProvisioning;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shadow_core::{plan_mode_change, FunctionalMode, ModePlan};
use thiserror::Error;

use crate::events::ProvisioningEventSink;
use crate::network::{ConnectivityError, NetworkStack};

/// Provisioning errors. None of them stop the device.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The provisioning client could not start.
    #[error("provisioning init failed: {0}")]
    InitFailed(String),

    /// Network time is not known yet.
    #[error("network time unavailable")]
    TimeUnavailable,

    /// A requested modem mode change failed.
    #[error(transparent)]
    ModeChange(#[from] ConnectivityError),
}

/// Serves modem mode-change requests from the provisioning client.
#[async_trait]
pub trait ModemModeHandler: Send + Sync {
    /// Switch to `requested` and return the mode that was active before.
    async fn on_mode_change(
        &self,
        requested: FunctionalMode,
    ) -> Result<FunctionalMode, ProvisioningError>;
}

/// Device provisioning client.
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Start the client.
    ///
    /// Mode-change requests go to `handler`; `Start`/`Stop`/`Done`
    /// notifications go to `events`.
    async fn init(
        &self,
        handler: Arc<dyn ModemModeHandler>,
        events: ProvisioningEventSink,
    ) -> Result<(), ProvisioningError>;

    /// Current network time in milliseconds since the Unix epoch.
    async fn query_current_time(&self) -> Result<u64, ProvisioningError>;
}

/// How long to wait for network time after reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSyncPolicy {
    /// Pause between time queries.
    pub poll_interval: Duration,
    /// Give up after this many failed queries. `None` waits forever.
    pub max_attempts: Option<u32>,
}

impl Default for TimeSyncPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

/// The [`ModemModeHandler`] used by the coordinator.
pub struct ModeSwitcher {
    network: Arc<dyn NetworkStack>,
    clock: Arc<dyn ProvisioningClient>,
    policy: TimeSyncPolicy,
}

impl std::fmt::Debug for ModeSwitcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeSwitcher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ModeSwitcher {
    /// Create a handler that switches `network` and reads time from `clock`.
    pub fn new(
        network: Arc<dyn NetworkStack>,
        clock: Arc<dyn ProvisioningClient>,
        policy: TimeSyncPolicy,
    ) -> Self {
        Self {
            network,
            clock,
            policy,
        }
    }

    async fn wait_for_time(&self) -> Result<u64, ProvisioningError> {
        let mut attempts = 0u32;
        loop {
            match self.clock.query_current_time().await {
                Ok(now) => return Ok(now),
                Err(e) => {
                    attempts += 1;
                    if self.policy.max_attempts.is_some_and(|max| attempts >= max) {
                        tracing::warn!("gave up waiting for network time after {} attempts", attempts);
                        return Err(e);
                    }
                    tracing::debug!("waiting for network time: {}", e);
                }
            }
            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }
}

#[async_trait]
impl ModemModeHandler for ModeSwitcher {
    async fn on_mode_change(
        &self,
        requested: FunctionalMode,
    ) -> Result<FunctionalMode, ProvisioningError> {
        let current = self.network.functional_mode().await?;

        match plan_mode_change(current, requested) {
            ModePlan::Unchanged => {
                tracing::debug!("modem already in {} mode", current);
            }
            ModePlan::Reconnect => {
                tracing::info!("Provisioning done, reconnecting to network");
                self.network.connect().await?;
                let now = self.wait_for_time().await?;
                tracing::info!("Network time available ({} ms)", now);
            }
            ModePlan::Apply(mode) => {
                tracing::info!("Switching modem from {} to {} mode", current, mode);
                self.network.set_functional_mode(mode).await?;
            }
        }

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MockModem;

    fn switcher(modem: &MockModem, clock: &MockProvisioning, policy: TimeSyncPolicy) -> ModeSwitcher {
        ModeSwitcher::new(Arc::new(modem.clone()), Arc::new(clock.clone()), policy)
    }

    #[tokio::test]
    async fn same_mode_does_nothing() {
        let modem = MockModem::new();
        modem.set_mode(FunctionalMode::Offline);
        let handler = switcher(&modem, &MockProvisioning::new(), TimeSyncPolicy::default());

        let previous = handler.on_mode_change(FunctionalMode::Offline).await.unwrap();

        assert_eq!(previous, FunctionalMode::Offline);
        assert!(modem.mode_requests().is_empty());
        assert_eq!(modem.connect_calls(), 0);
    }

    #[tokio::test]
    async fn other_modes_are_set_directly() {
        let modem = MockModem::new();
        modem.set_mode(FunctionalMode::Normal);
        let handler = switcher(&modem, &MockProvisioning::new(), TimeSyncPolicy::default());

        let previous = handler.on_mode_change(FunctionalMode::Offline).await.unwrap();

        assert_eq!(previous, FunctionalMode::Normal);
        assert_eq!(modem.mode(), FunctionalMode::Offline);
        assert_eq!(modem.connect_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_normal_reconnects_and_waits_for_time() {
        let modem = MockModem::new();
        modem.set_mode(FunctionalMode::Offline);
        let clock = MockProvisioning::new();
        clock.fail_time_queries(3);
        let handler = switcher(&modem, &clock, TimeSyncPolicy::default());

        let previous = handler.on_mode_change(FunctionalMode::Normal).await.unwrap();

        assert_eq!(previous, FunctionalMode::Offline);
        assert_eq!(modem.connect_calls(), 1);
        assert_eq!(modem.mode(), FunctionalMode::Normal);
        assert_eq!(clock.time_queries(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_time_wait_gives_up() {
        let modem = MockModem::new();
        modem.set_mode(FunctionalMode::Offline);
        let clock = MockProvisioning::new();
        clock.fail_time_queries(10);
        let policy = TimeSyncPolicy {
            poll_interval: Duration::from_secs(1),
            max_attempts: Some(2),
        };
        let handler = switcher(&modem, &clock, policy);

        let result = handler.on_mode_change(FunctionalMode::Normal).await;

        assert!(matches!(result, Err(ProvisioningError::TimeUnavailable)));
        assert_eq!(clock.time_queries(), 2);
    }

    #[tokio::test]
    async fn failed_mode_change_is_reported() {
        let modem = MockModem::new();
        modem.set_mode(FunctionalMode::Normal);
        modem.fail_next_mode("at command timeout");
        let handler = switcher(&modem, &MockProvisioning::new(), TimeSyncPolicy::default());

        let result = handler.on_mode_change(FunctionalMode::LteDeactivated).await;

        assert!(matches!(result, Err(ProvisioningError::ModeChange(_))));
    }
}
