//! # shadow-client
//!
//! Device-side runtime for cellshadow: keeps the cloud shadow document and
//! the device configuration in sync, and sequences network attach and
//! provisioning before the sync engine starts.
//!
//! ## Features
//!
//! - **Shadow Engine**: periodic fetch → decode → apply → report cycles
//! - **Lifecycle Coordinator**: attach, optional provisioning, restart on completion
//! - **Collaborator Traits**: pluggable network stack, provisioning client,
//!   cloud transport and device control, each with a mock implementation
//! - **Pure State Machines**: protocol decisions come from shadow-core
//!
//! ## Example
//!
//! ```ignore
//! use cellshadow_client::{Coordinator, CoordinatorConfig, LogDisplay};
//!
//! let coordinator = Coordinator::new(
//!     CoordinatorConfig::default(),
//!     network,
//!     provisioning,
//!     device,
//!     transport,
//!     Box::new(LogDisplay),
//! );
//!
//! // Never returns unless startup fails
//! let err = coordinator.run().await.unwrap_err();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod coordinator;
pub mod device;
pub mod display;
pub mod engine;
pub mod events;
pub mod network;
pub mod provisioning;
pub mod signal;
pub mod transport;

pub use adapter::{SessionPolicy, ShadowAdapter};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError};
pub use device::{DeviceControl, MockDevice};
pub use display::{ConfigSink, LogDisplay, MemoryDisplay};
pub use engine::{EngineConfig, EngineError, Heartbeat, ShadowEngine, DEFAULT_POLL_INTERVAL};
pub use events::{DeviceEvent, NetworkEventSink, ProvisioningEventSink};
pub use network::{ConnectivityError, MockModem, ModemEvent, NetworkEvent, NetworkStack, RrcMode};
pub use provisioning::{
    MockProvisioning, ModeSwitcher, ModemModeHandler, ProvisioningClient, ProvisioningError,
    TimeSyncPolicy,
};
pub use signal::{spawn_poll_timer, PollSignal};
pub use transport::{CloudTransport, MockCloud, SentMessage, TransportError};
