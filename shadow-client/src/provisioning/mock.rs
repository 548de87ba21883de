//! Mock provisioning client for testing.

use super::{ModemModeHandler, ProvisioningClient, ProvisioningError};
use crate::events::ProvisioningEventSink;
use async_trait::async_trait;
use shadow_core::{FunctionalMode, ProvisioningEvent};
use std::sync::{Arc, Mutex};

/// Mock provisioning client.
///
/// Emits a scripted sequence of lifecycle events when initialized and keeps
/// the mode handler so tests can issue mode-change requests.
#[derive(Default)]
pub struct MockProvisioning {
    inner: Arc<Mutex<MockProvisioningInner>>,
}

#[derive(Default)]
struct MockProvisioningInner {
    script: Vec<ProvisioningEvent>,
    handler: Option<Arc<dyn ModemModeHandler>>,
    sink: Option<ProvisioningEventSink>,
    init_calls: usize,
    time_queries: usize,
    failing_time_queries: usize,
    now_ms: u64,
    fail_next_init: Option<String>,
}

impl MockProvisioning {
    /// Create a client that emits nothing on init.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `events` in order as soon as `init()` is called.
    pub fn with_script(self, events: impl IntoIterator<Item = ProvisioningEvent>) -> Self {
        self.inner.lock().unwrap().script = events.into_iter().collect();
        self
    }

    /// Deliver an event through the registered sink.
    ///
    /// Returns false if the client was not initialized.
    pub fn emit(&self, event: ProvisioningEvent) -> bool {
        let sink = self.inner.lock().unwrap().sink.clone();
        match sink {
            Some(sink) => {
                sink.deliver(event);
                true
            }
            None => false,
        }
    }

    /// Ask the registered handler for a mode change, like the real client
    /// does while writing credentials.
    pub async fn request_mode(
        &self,
        mode: FunctionalMode,
    ) -> Option<Result<FunctionalMode, ProvisioningError>> {
        let handler = self.inner.lock().unwrap().handler.clone();
        match handler {
            Some(handler) => Some(handler.on_mode_change(mode).await),
            None => None,
        }
    }

    /// Make the next `n` time queries fail.
    pub fn fail_time_queries(&self, n: usize) {
        self.inner.lock().unwrap().failing_time_queries = n;
    }

    /// Set the time returned by successful queries.
    pub fn set_time(&self, now_ms: u64) {
        self.inner.lock().unwrap().now_ms = now_ms;
    }

    /// Number of time queries so far.
    pub fn time_queries(&self) -> usize {
        self.inner.lock().unwrap().time_queries
    }

    /// Number of `init()` calls.
    pub fn init_calls(&self) -> usize {
        self.inner.lock().unwrap().init_calls
    }

    /// Cause the next init() to fail with the given error.
    pub fn fail_next_init(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_init = Some(error.to_string());
    }
}

impl Clone for MockProvisioning {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for MockProvisioning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("MockProvisioning")
            .field("script", &inner.script)
            .field("initialized", &inner.handler.is_some())
            .field("init_calls", &inner.init_calls)
            .field("time_queries", &inner.time_queries)
            .finish()
    }
}

#[async_trait]
impl ProvisioningClient for MockProvisioning {
    async fn init(
        &self,
        handler: Arc<dyn ModemModeHandler>,
        events: ProvisioningEventSink,
    ) -> Result<(), ProvisioningError> {
        let script = {
            let mut inner = self.inner.lock().unwrap();
            inner.init_calls += 1;

            if let Some(error) = inner.fail_next_init.take() {
                return Err(ProvisioningError::InitFailed(error));
            }

            inner.handler = Some(handler);
            inner.sink = Some(events.clone());
            inner.script.clone()
        };

        for event in script {
            events.deliver(event);
        }
        Ok(())
    }

    async fn query_current_time(&self) -> Result<u64, ProvisioningError> {
        let mut inner = self.inner.lock().unwrap();
        inner.time_queries += 1;

        if inner.failing_time_queries > 0 {
            inner.failing_time_queries -= 1;
            return Err(ProvisioningError::TimeUnavailable);
        }
        Ok(inner.now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DeviceEvent;
    use crate::network::MockModem;
    use crate::provisioning::{ModeSwitcher, TimeSyncPolicy};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn init_emits_script() {
        let client = MockProvisioning::new()
            .with_script([ProvisioningEvent::Start, ProvisioningEvent::Stop]);
        let (tx, mut rx) = mpsc::channel(4);
        let handler = Arc::new(ModeSwitcher::new(
            Arc::new(MockModem::new()),
            Arc::new(client.clone()),
            TimeSyncPolicy::default(),
        ));

        client
            .init(handler, ProvisioningEventSink::new(tx))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(DeviceEvent::Provisioning(ProvisioningEvent::Start))
        );
        assert_eq!(
            rx.recv().await,
            Some(DeviceEvent::Provisioning(ProvisioningEvent::Stop))
        );
    }

    #[tokio::test]
    async fn request_mode_goes_to_handler() {
        let modem = MockModem::new();
        modem.set_mode(FunctionalMode::Normal);
        let client = MockProvisioning::new();
        assert!(client.request_mode(FunctionalMode::Offline).await.is_none());

        let (tx, _rx) = mpsc::channel(4);
        let handler = Arc::new(ModeSwitcher::new(
            Arc::new(modem.clone()),
            Arc::new(client.clone()),
            TimeSyncPolicy::default(),
        ));
        client
            .init(handler, ProvisioningEventSink::new(tx))
            .await
            .unwrap();

        let previous = client.request_mode(FunctionalMode::Offline).await;
        assert_eq!(previous.unwrap().unwrap(), FunctionalMode::Normal);
        assert_eq!(modem.mode(), FunctionalMode::Offline);
    }

    #[tokio::test]
    async fn time_queries_fail_then_succeed() {
        let client = MockProvisioning::new();
        client.set_time(1_700_000_000_000);
        client.fail_time_queries(1);

        assert!(matches!(
            client.query_current_time().await,
            Err(ProvisioningError::TimeUnavailable)
        ));
        assert_eq!(client.query_current_time().await.unwrap(), 1_700_000_000_000);
        assert_eq!(client.time_queries(), 2);
    }
}
