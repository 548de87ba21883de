//! Connectivity and provisioning lifecycle state machine.
//!
//! Tracks `ConnectivityState × ProvisioningState` and decides when the
//! startup sequencer may be released and when the device must restart.
//! The coordinator in `shadow-client` owns one [`Lifecycle`] inside its
//! event pump and executes the returned [`LifecycleAction`]s.

/// Network attach progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    /// Network not started.
    #[default]
    Disconnected,
    /// Connection requested, waiting for registration.
    Attaching,
    /// Registered on a home or roaming network.
    Attached,
}

/// Provisioning progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvisioningState {
    /// No provisioning run in progress.
    #[default]
    Idle,
    /// The provisioning client is working.
    Running,
    /// Provisioning finished; the device is restarting. Terminal.
    Done,
}

/// Network registration status as reported by the modem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// Not registered and not searching.
    NotRegistered,
    /// Registered on the home network.
    RegisteredHome,
    /// Searching for a network.
    Searching,
    /// Registration was denied.
    RegistrationDenied,
    /// Status unknown (e.g. out of coverage).
    Unknown,
    /// Registered while roaming.
    RegisteredRoaming,
    /// SIM card failure.
    UiccFailure,
}

impl RegistrationStatus {
    /// Home and roaming registration both count as attached.
    pub fn is_registered(self) -> bool {
        matches!(self, Self::RegisteredHome | Self::RegisteredRoaming)
    }

    /// Statuses that mean an existing attach has been lost.
    fn is_detached(self) -> bool {
        matches!(
            self,
            Self::NotRegistered | Self::Searching | Self::RegistrationDenied | Self::UiccFailure
        )
    }
}

/// Lifecycle notifications from the provisioning client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningEvent {
    /// A provisioning run started.
    Start,
    /// The run stopped without new credentials; normal startup may continue.
    Stop,
    /// New credentials are installed; the device must restart.
    Done,
}

/// Events fed into the lifecycle machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The network stack was asked to connect.
    ConnectRequested,
    /// The modem reported a registration status.
    Registration(RegistrationStatus),
    /// The provisioning client reported progress.
    Provisioning(ProvisioningEvent),
}

/// Actions to be executed by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Wake the sequencer waiting for attach.
    ReleaseAttach,
    /// Wake the sequencer waiting for provisioning to settle.
    ReleaseProvisioning,
    /// Take the modem offline before restarting. Errors are ignored.
    Detach,
    /// Restart the device.
    Restart,
}

/// Combined connectivity and provisioning state - NO I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifecycle {
    connectivity: ConnectivityState,
    provisioning: ProvisioningState,
}

impl Lifecycle {
    /// Create a machine with the network down and no provisioning run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connectivity state.
    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity
    }

    /// Current provisioning state.
    pub fn provisioning(&self) -> ProvisioningState {
        self.provisioning
    }

    /// Process an event and return the new state plus actions to execute.
    pub fn on_event(self, event: LifecycleEvent) -> (Self, Vec<LifecycleAction>) {
        // A completed provisioning run means a restart is underway.
        if self.provisioning == ProvisioningState::Done {
            return (self, vec![]);
        }

        match event {
            LifecycleEvent::ConnectRequested => match self.connectivity {
                ConnectivityState::Disconnected => (
                    self.with_connectivity(ConnectivityState::Attaching),
                    vec![],
                ),
                _ => (self, vec![]),
            },

            LifecycleEvent::Registration(status) if status.is_registered() => {
                match self.connectivity {
                    ConnectivityState::Attached => (self, vec![]),
                    _ => (
                        self.with_connectivity(ConnectivityState::Attached),
                        vec![LifecycleAction::ReleaseAttach],
                    ),
                }
            }
            LifecycleEvent::Registration(status)
                if status.is_detached() && self.connectivity == ConnectivityState::Attached =>
            {
                (
                    self.with_connectivity(ConnectivityState::Attaching),
                    vec![],
                )
            }
            LifecycleEvent::Registration(_) => (self, vec![]),

            LifecycleEvent::Provisioning(ProvisioningEvent::Start) => {
                (self.with_provisioning(ProvisioningState::Running), vec![])
            }
            LifecycleEvent::Provisioning(ProvisioningEvent::Stop) => (
                self.with_provisioning(ProvisioningState::Idle),
                vec![LifecycleAction::ReleaseProvisioning],
            ),
            LifecycleEvent::Provisioning(ProvisioningEvent::Done) => (
                self.with_provisioning(ProvisioningState::Done),
                vec![LifecycleAction::Detach, LifecycleAction::Restart],
            ),
        }
    }

    /// Whether the shadow engine is allowed to run in this state.
    pub fn engine_may_start(&self) -> bool {
        self.connectivity == ConnectivityState::Attached
            && self.provisioning == ProvisioningState::Idle
    }

    /// Whether a restart has been triggered.
    pub fn is_restarting(&self) -> bool {
        self.provisioning == ProvisioningState::Done
    }

    fn with_connectivity(self, connectivity: ConnectivityState) -> Self {
        Self {
            connectivity,
            ..self
        }
    }

    fn with_provisioning(self, provisioning: ProvisioningState) -> Self {
        Self {
            provisioning,
            ..self
        }
    }
}
