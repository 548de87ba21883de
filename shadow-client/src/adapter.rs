//! Shadow transport adapter.
//!
//! [`ShadowAdapter`] is the only path from the engine to the cloud. It keeps
//! the session bookkeeping (one-time client init, reconnect on demand) and
//! turns an empty shadow fetch into "no change".

use shadow_types::ShadowDelta;

use crate::transport::{CloudTransport, TransportError};

/// Default receive buffer for shadow deltas, in bytes.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// When the cloud session is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// Keep the session open between polls.
    #[default]
    Persistent,
    /// Close the session after every poll cycle; the next cycle reopens it.
    PerCycle,
}

/// Narrow wrapper around a [`CloudTransport`].
#[derive(Debug)]
pub struct ShadowAdapter<T: CloudTransport> {
    transport: T,
    buffer_capacity: usize,
    initialized: bool,
}

impl<T: CloudTransport> ShadowAdapter<T> {
    /// Create an adapter with the given delta buffer capacity.
    pub fn new(transport: T, buffer_capacity: usize) -> Self {
        Self {
            transport,
            buffer_capacity,
            initialized: false,
        }
    }

    /// Open the session unless it is already open.
    ///
    /// The transport's `init()` runs only once per adapter; `connect()` runs
    /// whenever the transport reports no session.
    pub async fn ensure_session(&mut self) -> Result<(), TransportError> {
        if !self.initialized {
            self.transport.init().await?;
            self.initialized = true;
            tracing::debug!("cloud transport initialized");
        }

        if !self.transport.is_connected() {
            self.transport.connect().await?;
            tracing::info!("cloud session established");
        }

        Ok(())
    }

    /// Fetch the pending delta.
    ///
    /// Returns `Ok(None)` when nothing is pending, including when the cloud
    /// answers with a zero-length document.
    pub async fn fetch_delta(&self) -> Result<Option<ShadowDelta>, TransportError> {
        let delta = self.transport.shadow_get(self.buffer_capacity).await?;
        if delta.is_empty() {
            return Ok(None);
        }
        tracing::debug!(
            "fetched shadow delta ({} bytes, {})",
            delta.len(),
            delta.format
        );
        Ok(Some(delta))
    }

    /// Publish a reported document.
    pub async fn publish_report(&self, doc: &[u8]) -> Result<(), TransportError> {
        self.transport.shadow_update(doc).await
    }

    /// Send a device message.
    pub async fn send_message(
        &self,
        app_id: &str,
        payload: &[u8],
        confirmable: bool,
    ) -> Result<(), TransportError> {
        self.transport
            .send_message(app_id, payload, confirmable)
            .await
    }

    /// Close the session if one is open.
    pub async fn close_session(&self) -> Result<(), TransportError> {
        if self.transport.is_connected() {
            self.transport.disconnect().await?;
            tracing::debug!("cloud session closed");
        }
        Ok(())
    }
}
