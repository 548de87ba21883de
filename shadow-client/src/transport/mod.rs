//! Cloud transport abstraction for cellshadow.
//!
//! This module defines the narrow contract the shadow engine needs from the
//! cloud connection (session management, device messages, shadow get and
//! update). Request framing on the wire is the implementation's business.
//!
//! # Design
//!
//! The transport trait is async and session-oriented:
//! - `init()` prepares the client once per boot
//! - `connect()` / `disconnect()` open and close the session
//! - `shadow_get()` fetches the pending delta, classified by payload format
//! - `shadow_update()` publishes the reported document
//!
//! # Example
//!
//! ```ignore
//! let transport = MockCloud::new();
//! transport.init().await?;
//! transport.connect().await?;
//! let delta = transport.shadow_get(1024).await?;
//! transport.shadow_update(br#"{"config":{"display":""}}"#).await?;
//! ```

mod mock;

pub use mock::{MockCloud, SentMessage};

use async_trait::async_trait;
use shadow_types::ShadowDelta;
use thiserror::Error;

/// Transport errors.
///
/// Inside a poll cycle every variant is recoverable: the cycle is skipped
/// and the next poll tries again.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Client initialization failed.
    #[error("transport init failed: {0}")]
    InitFailed(String),

    /// Session establishment failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No session is open.
    #[error("not connected")]
    NotConnected,

    /// Device message could not be sent.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Shadow fetch failed.
    #[error("shadow fetch failed: {0}")]
    FetchFailed(String),

    /// Shadow update was rejected or lost.
    #[error("shadow update failed: {0}")]
    UpdateFailed(String),

    /// The pending delta does not fit the receive buffer.
    #[error("delta too large: {size} bytes (capacity: {capacity} bytes)")]
    DeltaTooLarge {
        /// Size of the pending delta.
        size: usize,
        /// Receive buffer capacity.
        capacity: usize,
    },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,
}

/// Cloud transport used by the shadow adapter.
///
/// Implementations wrap the device's cloud client library.
#[async_trait]
pub trait CloudTransport: Send + Sync {
    /// Prepare the client. Called once before the first connect.
    async fn init(&self) -> Result<(), TransportError>;

    /// Open a session with the cloud.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Close the session.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Check if a session is open.
    fn is_connected(&self) -> bool;

    /// Send a device message to the given application endpoint.
    async fn send_message(
        &self,
        app_id: &str,
        payload: &[u8],
        confirmable: bool,
    ) -> Result<(), TransportError>;

    /// Fetch the pending shadow delta into a buffer of `capacity` bytes.
    ///
    /// An empty body means there is no pending change.
    async fn shadow_get(&self, capacity: usize) -> Result<ShadowDelta, TransportError>;

    /// Publish a reported document.
    async fn shadow_update(&self, document: &[u8]) -> Result<(), TransportError>;
}
