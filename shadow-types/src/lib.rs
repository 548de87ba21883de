//! # shadow-types
//!
//! Wire types for the cellshadow device-shadow protocol.
//!
//! This crate provides the foundational types shared by the other crates:
//! - [`DesiredConfig`], [`ReportedConfig`] - Device configuration as requested and as asserted
//! - [`ShadowDelta`], [`PayloadFormat`] - A pending delta as delivered by the cloud transport
//! - [`codec`] - Decoding and encoding of the `{"config":{...}}` shadow document
//! - [`DecodeError`], [`EncodeError`] - Codec error types

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
mod config;
mod delta;
mod error;

pub use codec::{decode, encode};
pub use config::{DesiredConfig, ReportedConfig};
pub use delta::{PayloadFormat, ShadowDelta};
pub use error::{DecodeError, EncodeError};
