//! Mock cloud transport for testing.
//!
//! Allows queueing shadow deltas and capturing published documents and
//! device messages for verification.

use super::{CloudTransport, TransportError};
use async_trait::async_trait;
use shadow_types::ShadowDelta;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A device message captured by [`MockCloud`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Application endpoint.
    pub app_id: String,
    /// Message body.
    pub payload: Vec<u8>,
    /// Whether delivery confirmation was requested.
    pub confirmable: bool,
}

/// Mock cloud transport for testing.
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Debug, Default)]
pub struct MockCloud {
    inner: Arc<Mutex<MockCloudInner>>,
}

#[derive(Debug, Default)]
struct MockCloudInner {
    initialized: bool,
    connected: bool,
    init_calls: usize,
    connect_calls: usize,
    disconnect_calls: usize,
    fetch_calls: usize,
    deltas: VecDeque<ShadowDelta>,
    updates: Vec<Vec<u8>>,
    messages: Vec<SentMessage>,
    fail_next_init: Option<String>,
    fail_next_connect: Option<String>,
    fail_next_fetch: Option<String>,
    fail_next_update: Option<String>,
    fail_next_send: Option<String>,
}

impl MockCloud {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a delta to be returned by the next `shadow_get()` call.
    pub fn queue_delta(&self, delta: ShadowDelta) {
        let mut inner = self.inner.lock().unwrap();
        inner.deltas.push_back(delta);
    }

    /// Queue a JSON delta.
    pub fn queue_json(&self, body: &str) {
        self.queue_delta(ShadowDelta::json(body.as_bytes().to_vec()));
    }

    /// Get all documents published with `shadow_update()`.
    pub fn updates(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.updates.clone()
    }

    /// Get the last published document.
    pub fn last_update(&self) -> Option<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.updates.last().cloned()
    }

    /// Get all device messages sent.
    pub fn messages(&self) -> Vec<SentMessage> {
        let inner = self.inner.lock().unwrap();
        inner.messages.clone()
    }

    /// Number of `init()` calls that succeeded or failed.
    pub fn init_calls(&self) -> usize {
        self.inner.lock().unwrap().init_calls
    }

    /// Number of `connect()` calls.
    pub fn connect_calls(&self) -> usize {
        self.inner.lock().unwrap().connect_calls
    }

    /// Number of `disconnect()` calls.
    pub fn disconnect_calls(&self) -> usize {
        self.inner.lock().unwrap().disconnect_calls
    }

    /// Number of `shadow_get()` calls.
    pub fn fetch_calls(&self) -> usize {
        self.inner.lock().unwrap().fetch_calls
    }

    /// Drop the session as if the network went away.
    pub fn drop_session(&self) {
        self.inner.lock().unwrap().connected = false;
    }

    /// Cause the next init() to fail with the given error.
    pub fn fail_next_init(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_init = Some(error.to_string());
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next shadow_get() to fail with the given error.
    pub fn fail_next_fetch(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_fetch = Some(error.to_string());
    }

    /// Cause the next shadow_update() to fail with the given error.
    pub fn fail_next_update(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_update = Some(error.to_string());
    }

    /// Cause the next send_message() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_send = Some(error.to_string());
    }
}

impl Clone for MockCloud {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl CloudTransport for MockCloud {
    async fn init(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.init_calls += 1;

        if let Some(error) = inner.fail_next_init.take() {
            return Err(TransportError::InitFailed(error));
        }

        inner.initialized = true;
        Ok(())
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_calls += 1;

        if !inner.initialized {
            return Err(TransportError::ConnectionFailed(
                "client not initialized".into(),
            ));
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.disconnect_calls += 1;
        inner.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    async fn send_message(
        &self,
        app_id: &str,
        payload: &[u8],
        confirmable: bool,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.messages.push(SentMessage {
            app_id: app_id.to_string(),
            payload: payload.to_vec(),
            confirmable,
        });
        Ok(())
    }

    async fn shadow_get(&self, capacity: usize) -> Result<ShadowDelta, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_calls += 1;

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_fetch.take() {
            return Err(TransportError::FetchFailed(error));
        }

        let delta = inner.deltas.pop_front().unwrap_or_else(ShadowDelta::empty);
        if delta.len() > capacity {
            return Err(TransportError::DeltaTooLarge {
                size: delta.len(),
                capacity,
            });
        }
        Ok(delta)
    }

    async fn shadow_update(&self, document: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }

        if let Some(error) = inner.fail_next_update.take() {
            return Err(TransportError::UpdateFailed(error));
        }

        inner.updates.push(document.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadow_types::PayloadFormat;

    async fn connected() -> MockCloud {
        let cloud = MockCloud::new();
        cloud.init().await.unwrap();
        cloud.connect().await.unwrap();
        cloud
    }

    #[tokio::test]
    async fn connect_requires_init() {
        let cloud = MockCloud::new();
        let result = cloud.connect().await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!cloud.is_connected());

        cloud.init().await.unwrap();
        cloud.connect().await.unwrap();
        assert!(cloud.is_connected());
    }

    #[tokio::test]
    async fn shadow_get_returns_queued_deltas_in_order() {
        let cloud = connected().await;
        cloud.queue_json(r#"{"config":{"display":"A"}}"#);
        cloud.queue_delta(ShadowDelta::new(PayloadFormat::Cbor, vec![0xa0]));

        let first = cloud.shadow_get(1024).await.unwrap();
        assert_eq!(first.format, PayloadFormat::Json);
        let second = cloud.shadow_get(1024).await.unwrap();
        assert_eq!(second.format, PayloadFormat::Cbor);
        assert_eq!(cloud.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn shadow_get_empty_queue_returns_empty_delta() {
        let cloud = connected().await;
        let delta = cloud.shadow_get(1024).await.unwrap();
        assert!(delta.is_empty());
    }

    #[tokio::test]
    async fn shadow_get_respects_capacity() {
        let cloud = connected().await;
        cloud.queue_json(r#"{"config":{"display":"too long for eight"}}"#);

        let result = cloud.shadow_get(8).await;
        assert!(matches!(
            result,
            Err(TransportError::DeltaTooLarge { capacity: 8, .. })
        ));
    }

    #[tokio::test]
    async fn calls_without_session_fail() {
        let cloud = MockCloud::new();
        assert!(matches!(
            cloud.shadow_get(16).await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            cloud.shadow_update(b"{}").await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            cloud.send_message("custom", b"x", false).await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn forced_update_failure_is_one_shot() {
        let cloud = connected().await;
        cloud.fail_next_update("rejected");

        let result = cloud.shadow_update(b"doc").await;
        assert!(matches!(result, Err(TransportError::UpdateFailed(_))));

        cloud.shadow_update(b"doc").await.unwrap();
        assert_eq!(cloud.updates(), vec![b"doc".to_vec()]);
    }

    #[tokio::test]
    async fn messages_are_captured() {
        let cloud = connected().await;
        cloud.send_message("custom", b"COAP test", false).await.unwrap();

        assert_eq!(
            cloud.messages(),
            vec![SentMessage {
                app_id: "custom".into(),
                payload: b"COAP test".to_vec(),
                confirmable: false,
            }]
        );
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let cloud1 = connected().await;
        let cloud2 = cloud1.clone();

        cloud2.shadow_update(b"from clone").await.unwrap();
        assert_eq!(cloud1.last_update(), Some(b"from clone".to_vec()));

        cloud1.drop_session();
        assert!(!cloud2.is_connected());
    }
}
