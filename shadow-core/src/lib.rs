//! # shadow-core
//!
//! Pure logic for cellshadow (no I/O, instant tests).
//!
//! This crate implements the state machines that drive shadow
//! synchronization and the device connectivity lifecycle, without any
//! network, timer or device I/O.
//!
//! ## Design Philosophy
//!
//! Every machine here takes an event and returns the next state plus a list
//! of actions. The actual I/O (transport calls, modem requests, restarts) is
//! performed by `shadow-client`, which interprets the actions and feeds the
//! results back in as events.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod lifecycle;
pub mod mode;

pub use engine::{CycleOutcome, EngineAction, EngineEvent, EngineState, StartupFailure};
pub use lifecycle::{
    ConnectivityState, Lifecycle, LifecycleAction, LifecycleEvent, ProvisioningEvent,
    ProvisioningState, RegistrationStatus,
};
pub use mode::{plan_mode_change, FunctionalMode, ModePlan};
