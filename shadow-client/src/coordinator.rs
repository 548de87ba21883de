//! Connectivity lifecycle coordinator.
//!
//! Sequences device startup: modem init, network attach, an optional
//! provisioning run, then the shadow engine. Network and provisioning
//! callbacks are funnelled through a bounded queue into an event pump task
//! that owns the [`Lifecycle`] machine and executes its actions.
//!
//! ```text
//! NetworkStack ──┐
//!                ├─ mpsc ─→ EventPump (Lifecycle) ─→ Notify ─→ run()
//! Provisioning ──┘                │
//!                                 └─→ Detach / Restart
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use shadow_core::{
    FunctionalMode, Lifecycle, LifecycleAction, LifecycleEvent, ProvisioningEvent,
    RegistrationStatus,
};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Notify};

use crate::device::DeviceControl;
use crate::display::ConfigSink;
use crate::engine::{EngineConfig, EngineError, ShadowEngine};
use crate::events::{DeviceEvent, NetworkEventSink, ProvisioningEventSink};
use crate::network::{ConnectivityError, ModemEvent, NetworkEvent, NetworkStack};
use crate::provisioning::{ModeSwitcher, ProvisioningClient, TimeSyncPolicy};
use crate::signal::{spawn_poll_timer, PollSignal};
use crate::transport::CloudTransport;

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The network could not be brought up.
    #[error("network unavailable: {0}")]
    Connectivity(#[from] ConnectivityError),

    /// The shadow engine failed to start.
    #[error("shadow engine failed: {0}")]
    Engine(#[from] EngineError),

    /// The poll interval is zero.
    #[error("poll interval must be non-zero")]
    ZeroPollInterval,
}

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Shadow engine settings.
    pub engine: EngineConfig,
    /// Run the provisioning client before starting the engine.
    pub provisioning_enabled: bool,
    /// Network time wait used after provisioning reconnects.
    pub time_sync: TimeSyncPolicy,
    /// Capacity of the callback event queue.
    pub event_queue_depth: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            provisioning_enabled: true,
            time_sync: TimeSyncPolicy::default(),
            event_queue_depth: 16,
        }
    }
}

/// Owns the device collaborators and runs the startup sequence.
pub struct Coordinator<T: CloudTransport> {
    config: CoordinatorConfig,
    network: Arc<dyn NetworkStack>,
    provisioning: Arc<dyn ProvisioningClient>,
    device: Arc<dyn DeviceControl>,
    transport: T,
    sink: Box<dyn ConfigSink>,
}

impl<T: CloudTransport> std::fmt::Debug for Coordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: CloudTransport> Coordinator<T> {
    /// Create a coordinator.
    pub fn new(
        config: CoordinatorConfig,
        network: Arc<dyn NetworkStack>,
        provisioning: Arc<dyn ProvisioningClient>,
        device: Arc<dyn DeviceControl>,
        transport: T,
        sink: Box<dyn ConfigSink>,
    ) -> Self {
        Self {
            config,
            network,
            provisioning,
            device,
            transport,
            sink,
        }
    }

    /// Bring the device up and sync the shadow forever.
    ///
    /// Only returns on a fatal startup error. If provisioning completes, the
    /// device is restarted and this future never gets to start the engine.
    pub async fn run(self) -> Result<Infallible, CoordinatorError> {
        let Coordinator {
            config,
            network,
            provisioning,
            device,
            transport,
            sink,
        } = self;

        tracing::info!(
            "Coordinator starting (provisioning: {}, poll interval: {}s)",
            config.provisioning_enabled,
            config.engine.poll_interval.as_secs()
        );

        if config.engine.poll_interval.is_zero() {
            tracing::error!("Refusing to start with a zero poll interval");
            return Err(CoordinatorError::ZeroPollInterval);
        }

        if let Err(e) = network.initialize().await {
            tracing::error!("Modem initialization failed: {}", e);
            return Err(e.into());
        }

        let (tx, rx) = mpsc::channel(config.event_queue_depth.max(1));
        let provisioning_events = ProvisioningEventSink::new(tx.clone());
        let signals = StartupSignals::default();
        let pump = EventPump::new(
            rx,
            provisioning_events.parked_events(),
            signals.clone(),
            Arc::clone(&network),
            device,
        );
        tokio::spawn(pump.run());

        if let Err(e) = network.connect_async(NetworkEventSink::new(tx.clone())).await {
            tracing::error!("Failed to start network connection: {}", e);
            return Err(e.into());
        }

        signals.attached.notified().await;
        tracing::info!("Network attached");

        if config.provisioning_enabled {
            let handler = Arc::new(ModeSwitcher::new(
                Arc::clone(&network),
                Arc::clone(&provisioning),
                config.time_sync,
            ));
            match provisioning.init(handler, provisioning_events).await {
                Ok(()) => {
                    tracing::info!("Waiting for provisioning to finish");
                    signals.provisioned.notified().await;
                    tracing::info!("Provisioning finished");
                }
                Err(e) => {
                    tracing::warn!(
                        "Provisioning client unavailable, continuing without it: {}",
                        e
                    );
                }
            }
        }
        drop(tx);

        let poll_interval = config.engine.poll_interval;
        let mut engine = ShadowEngine::new(transport, config.engine, sink);
        engine.start().await?;

        let signal = PollSignal::new();
        let _timer = spawn_poll_timer(signal.clone(), poll_interval);

        Ok(engine.run(signal).await)
    }
}

/// Single-slot wake-ups for the startup sequence.
#[derive(Debug, Clone, Default)]
struct StartupSignals {
    attached: Arc<Notify>,
    provisioned: Arc<Notify>,
}

struct EventPump {
    lifecycle: Lifecycle,
    events: mpsc::Receiver<DeviceEvent>,
    parked: watch::Receiver<Option<ProvisioningEvent>>,
    signals: StartupSignals,
    network: Arc<dyn NetworkStack>,
    device: Arc<dyn DeviceControl>,
    // Provisioning settled but the engine may not start yet.
    release_pending: bool,
}

impl EventPump {
    fn new(
        events: mpsc::Receiver<DeviceEvent>,
        parked: watch::Receiver<Option<ProvisioningEvent>>,
        signals: StartupSignals,
        network: Arc<dyn NetworkStack>,
        device: Arc<dyn DeviceControl>,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            events,
            parked,
            signals,
            network,
            device,
            release_pending: false,
        }
    }

    async fn run(mut self) {
        self.step(LifecycleEvent::ConnectRequested).await;

        loop {
            let event = tokio::select! {
                biased;
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                Ok(()) = self.parked.changed() => {
                    let parked = *self.parked.borrow_and_update();
                    match parked {
                        Some(event) => DeviceEvent::Provisioning(event),
                        None => continue,
                    }
                }
            };

            match event {
                DeviceEvent::Network(event) => {
                    log_network_event(&event);
                    if let NetworkEvent::RegistrationStatus(status) = event {
                        self.step(LifecycleEvent::Registration(status)).await;
                    }
                }
                DeviceEvent::Provisioning(event) => {
                    tracing::info!("Provisioning event: {:?}", event);
                    self.step(LifecycleEvent::Provisioning(event)).await;
                }
            }

            if self.lifecycle.is_restarting() {
                break;
            }
        }

        tracing::debug!("event pump stopped");
    }

    async fn step(&mut self, event: LifecycleEvent) {
        let (next, actions) = self.lifecycle.on_event(event);
        if next != self.lifecycle {
            tracing::debug!(
                "lifecycle {:?}/{:?} -> {:?}/{:?}",
                self.lifecycle.connectivity(),
                self.lifecycle.provisioning(),
                next.connectivity(),
                next.provisioning()
            );
        }
        self.lifecycle = next;

        for action in actions {
            self.execute(action).await;
        }

        if self.release_pending && self.lifecycle.engine_may_start() {
            self.release_pending = false;
            self.signals.provisioned.notify_one();
        }
    }

    async fn execute(&mut self, action: LifecycleAction) {
        match action {
            LifecycleAction::ReleaseAttach => self.signals.attached.notify_one(),
            LifecycleAction::ReleaseProvisioning => {
                if !self.lifecycle.engine_may_start() {
                    tracing::info!("Provisioning stopped while detached, waiting for network");
                }
                self.release_pending = true;
            }
            LifecycleAction::Detach => {
                // Restart follows regardless.
                if let Err(e) = self
                    .network
                    .set_functional_mode(FunctionalMode::Offline)
                    .await
                {
                    tracing::warn!("Failed to take modem offline: {}", e);
                }
            }
            LifecycleAction::Restart => {
                tracing::warn!("Provisioning complete, restarting device");
                self.device.restart().await;
            }
        }
    }
}

fn log_network_event(event: &NetworkEvent) {
    match event {
        NetworkEvent::RegistrationStatus(RegistrationStatus::RegisteredHome) => {
            tracing::info!("Network registration status: Connected - home network")
        }
        NetworkEvent::RegistrationStatus(RegistrationStatus::RegisteredRoaming) => {
            tracing::info!("Network registration status: Connected - roaming")
        }
        NetworkEvent::RegistrationStatus(status) => {
            tracing::debug!("Network registration status: {:?}", status)
        }
        NetworkEvent::RrcModeChange(mode) => tracing::info!("RRC mode: {}", mode),
        NetworkEvent::CellChange {
            cell_id,
            tracking_area,
        } => tracing::info!(
            "LTE cell changed: Cell ID: {}, Tracking area: {}",
            cell_id,
            tracking_area
        ),
        NetworkEvent::ModemEvent(ModemEvent::Other(code)) => {
            tracing::info!("Modem event: {}", code)
        }
        NetworkEvent::ModemEvent(event) => tracing::info!("Modem event: {:?}", event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockDevice;
    use crate::display::MemoryDisplay;
    use crate::network::MockModem;
    use crate::provisioning::MockProvisioning;
    use crate::transport::MockCloud;
    use std::time::Duration;

    struct Rig {
        modem: MockModem,
        provisioning: MockProvisioning,
        device: MockDevice,
        cloud: MockCloud,
        display: MemoryDisplay,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                modem: MockModem::new().with_auto_register(RegistrationStatus::RegisteredHome),
                provisioning: MockProvisioning::new(),
                device: MockDevice::new(),
                cloud: MockCloud::new(),
                display: MemoryDisplay::new(),
            }
        }

        fn coordinator(&self, config: CoordinatorConfig) -> Coordinator<MockCloud> {
            Coordinator::new(
                config,
                Arc::new(self.modem.clone()),
                Arc::new(self.provisioning.clone()),
                Arc::new(self.device.clone()),
                self.cloud.clone(),
                Box::new(self.display.clone()),
            )
        }
    }

    fn without_provisioning() -> CoordinatorConfig {
        CoordinatorConfig {
            provisioning_enabled: false,
            ..CoordinatorConfig::default()
        }
    }

    /// Run the coordinator for a moment; `None` means it is still running.
    async fn run_briefly(
        coordinator: Coordinator<MockCloud>,
    ) -> Option<Result<Infallible, CoordinatorError>> {
        tokio::time::timeout(Duration::from_millis(100), coordinator.run())
            .await
            .ok()
    }

    #[tokio::test]
    async fn zero_poll_interval_is_rejected_before_startup() {
        let rig = Rig::new();
        rig.cloud.queue_json(r#"{"config":{"display":"HELLO"}}"#);
        let config = CoordinatorConfig {
            engine: EngineConfig::default().with_poll_interval(Duration::ZERO),
            ..without_provisioning()
        };

        let result = run_briefly(rig.coordinator(config)).await;

        assert!(matches!(
            result,
            Some(Err(CoordinatorError::ZeroPollInterval))
        ));
        assert_eq!(rig.modem.init_calls(), 0);
        assert!(rig.cloud.updates().is_empty());
        assert!(rig.display.history().is_empty());
    }

    #[tokio::test]
    async fn modem_init_failure_is_fatal() {
        let rig = Rig::new();
        rig.modem.fail_next_init("no firmware");

        let result = run_briefly(rig.coordinator(without_provisioning())).await;

        assert!(matches!(
            result,
            Some(Err(CoordinatorError::Connectivity(
                ConnectivityError::InitFailed(_)
            )))
        ));
        assert_eq!(rig.cloud.init_calls(), 0);
    }

    #[tokio::test]
    async fn connect_failure_is_fatal() {
        let rig = Rig::new();
        rig.modem.fail_next_connect("no sim");

        let result = run_briefly(rig.coordinator(without_provisioning())).await;

        assert!(matches!(
            result,
            Some(Err(CoordinatorError::Connectivity(
                ConnectivityError::ConnectFailed(_)
            )))
        ));
    }

    #[tokio::test]
    async fn engine_waits_for_registration() {
        let rig = Rig {
            modem: MockModem::new(),
            ..Rig::new()
        };

        let result = run_briefly(rig.coordinator(without_provisioning())).await;

        assert!(result.is_none());
        assert_eq!(rig.cloud.init_calls(), 0);
    }

    #[tokio::test]
    async fn searching_does_not_release_attach() {
        let rig = Rig {
            modem: MockModem::new().with_auto_register(RegistrationStatus::Searching),
            ..Rig::new()
        };

        let result = run_briefly(rig.coordinator(without_provisioning())).await;

        assert!(result.is_none());
        assert_eq!(rig.cloud.init_calls(), 0);
    }

    #[tokio::test]
    async fn engine_startup_failure_is_fatal() {
        let rig = Rig::new();
        rig.cloud.fail_next_update("forbidden");

        let result = run_briefly(rig.coordinator(without_provisioning())).await;

        assert!(matches!(
            result,
            Some(Err(CoordinatorError::Engine(EngineError::InitialReport(_))))
        ));
    }

    #[tokio::test]
    async fn attach_starts_engine_without_provisioning() {
        let rig = Rig::new();
        rig.cloud.queue_json(r#"{"config":{"display":"UP"}}"#);

        let result = run_briefly(rig.coordinator(without_provisioning())).await;

        assert!(result.is_none());
        assert_eq!(rig.provisioning.init_calls(), 0);
        assert_eq!(rig.display.current(), Some("UP".to_string()));
    }

    #[tokio::test]
    async fn provisioning_init_failure_is_not_fatal() {
        let rig = Rig::new();
        rig.provisioning.fail_next_init("no credentials service");

        let result = run_briefly(rig.coordinator(CoordinatorConfig::default())).await;

        assert!(result.is_none());
        assert_eq!(rig.provisioning.init_calls(), 1);
        assert_eq!(rig.cloud.updates().len(), 1, "engine started");
    }

    #[tokio::test]
    async fn provisioning_stop_releases_engine() {
        let rig = Rig::new();
        let rig = Rig {
            provisioning: MockProvisioning::new()
                .with_script([ProvisioningEvent::Start, ProvisioningEvent::Stop]),
            ..rig
        };

        let result = run_briefly(rig.coordinator(CoordinatorConfig::default())).await;

        assert!(result.is_none());
        assert_eq!(rig.device.restarts(), 0);
        assert_eq!(rig.cloud.updates().len(), 1, "engine started");
    }

    #[tokio::test]
    async fn provisioning_in_progress_holds_engine() {
        let rig = Rig::new();
        let rig = Rig {
            provisioning: MockProvisioning::new().with_script([ProvisioningEvent::Start]),
            ..rig
        };

        let result = run_briefly(rig.coordinator(CoordinatorConfig::default())).await;

        assert!(result.is_none());
        assert_eq!(rig.cloud.init_calls(), 0);
    }

    #[tokio::test]
    async fn provisioning_stop_while_detached_waits_for_attach() {
        let rig = Rig {
            provisioning: MockProvisioning::new().with_script([ProvisioningEvent::Start]),
            ..Rig::new()
        };
        let coordinator = rig.coordinator(CoordinatorConfig::default());
        let handle = tokio::spawn(async move {
            let _ = coordinator.run().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rig.provisioning.init_calls(), 1);

        rig.modem
            .emit(NetworkEvent::RegistrationStatus(RegistrationStatus::Searching));
        rig.provisioning.emit(ProvisioningEvent::Stop);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rig.cloud.init_calls(), 0, "engine held while detached");

        rig.modem.emit(NetworkEvent::RegistrationStatus(
            RegistrationStatus::RegisteredRoaming,
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(rig.cloud.updates().len(), 1, "engine started");
        handle.abort();
    }

    #[tokio::test]
    async fn parked_done_restarts_when_queue_is_full() {
        let rig = Rig::new();
        let (tx, rx) = mpsc::channel(1);
        let sink = ProvisioningEventSink::new(tx);
        let pump = EventPump::new(
            rx,
            sink.parked_events(),
            StartupSignals::default(),
            Arc::new(rig.modem.clone()),
            Arc::new(rig.device.clone()),
        );

        sink.deliver(ProvisioningEvent::Start);
        sink.deliver(ProvisioningEvent::Done);

        tokio::time::timeout(Duration::from_secs(1), pump.run())
            .await
            .expect("pump stops once the restart is underway");
        assert_eq!(rig.device.restarts(), 1);
        assert_eq!(rig.modem.mode_requests(), vec![FunctionalMode::Offline]);
        drop(sink);
    }

    #[tokio::test]
    async fn parked_stop_releases_engine_when_queue_is_full() {
        let rig = Rig::new();
        let (tx, rx) = mpsc::channel(1);
        let network = NetworkEventSink::new(tx.clone());
        let sink = ProvisioningEventSink::new(tx);
        let signals = StartupSignals::default();
        let pump = EventPump::new(
            rx,
            sink.parked_events(),
            signals.clone(),
            Arc::new(rig.modem.clone()),
            Arc::new(rig.device.clone()),
        );

        network.deliver(NetworkEvent::RegistrationStatus(
            RegistrationStatus::RegisteredHome,
        ));
        sink.deliver(ProvisioningEvent::Stop);
        let handle = tokio::spawn(pump.run());

        tokio::time::timeout(Duration::from_secs(1), signals.provisioned.notified())
            .await
            .expect("parked stop releases the engine");
        handle.abort();
    }
}
