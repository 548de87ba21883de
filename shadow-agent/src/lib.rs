//! # shadow-agent
//!
//! Runs a cellshadow device against simulated collaborators.
//!
//! The agent loads its settings from a TOML file, builds the coordinator
//! and runs the full device lifecycle:
//!
//! ```text
//! modem init → attach → provisioning → shadow engine (poll forever)
//!                            │
//!                            └─ new credentials → restart (agent exits)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod sim;
