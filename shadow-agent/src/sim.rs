//! Simulated device.
//!
//! Wires the coordinator to the in-memory modem, provisioning client and
//! cloud so the whole startup sequence can be exercised on a workstation.

use std::sync::Arc;

use async_trait::async_trait;
use shadow_client::{
    Coordinator, CoordinatorConfig, DeviceControl, LogDisplay, MockCloud, MockModem,
    MockProvisioning,
};
use shadow_core::{ProvisioningEvent, RegistrationStatus};
use tokio::sync::Notify;

use crate::config::{Config, Registration};

/// How the simulated provisioning run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ProvisioningRun {
    /// The run stops without new credentials.
    #[default]
    Stop,
    /// New credentials are installed and the device restarts.
    Done,
}

impl ProvisioningRun {
    fn script(self) -> Vec<ProvisioningEvent> {
        match self {
            ProvisioningRun::Stop => vec![ProvisioningEvent::Start, ProvisioningEvent::Stop],
            ProvisioningRun::Done => vec![ProvisioningEvent::Start, ProvisioningEvent::Done],
        }
    }
}

/// Restart hook that wakes the agent's main task instead of rebooting.
#[derive(Debug, Clone, Default)]
pub struct RestartRequest {
    notify: Arc<Notify>,
}

impl RestartRequest {
    /// Wait until a restart is requested.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

#[async_trait]
impl DeviceControl for RestartRequest {
    async fn restart(&self) {
        tracing::warn!("Device restart requested");
        self.notify.notify_one();
    }
}

/// The collaborators of one simulated device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    /// Simulated modem.
    pub modem: MockModem,
    /// Simulated provisioning client.
    pub provisioning: MockProvisioning,
    /// Simulated cloud.
    pub cloud: MockCloud,
    /// Restart hook.
    pub restart: RestartRequest,
}

impl SimulatedDevice {
    /// Build a device whose cloud serves `deltas` in order.
    pub fn new(config: &Config, deltas: &[String], run: ProvisioningRun) -> Self {
        let registration = match config.network.registration {
            Registration::Home => RegistrationStatus::RegisteredHome,
            Registration::Roaming => RegistrationStatus::RegisteredRoaming,
        };

        let cloud = MockCloud::new();
        for delta in deltas {
            cloud.queue_json(delta);
        }

        Self {
            modem: MockModem::new().with_auto_register(registration),
            provisioning: MockProvisioning::new().with_script(run.script()),
            cloud,
            restart: RestartRequest::default(),
        }
    }

    /// Create the coordinator for this device.
    pub fn coordinator(&self, config: CoordinatorConfig) -> Coordinator<MockCloud> {
        Coordinator::new(
            config,
            Arc::new(self.modem.clone()),
            Arc::new(self.provisioning.clone()),
            Arc::new(self.restart.clone()),
            self.cloud.clone(),
            Box::new(LogDisplay),
        )
    }
}
