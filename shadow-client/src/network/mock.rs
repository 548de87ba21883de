//! Mock modem for testing.

use super::{ConnectivityError, NetworkEvent, NetworkStack};
use crate::events::NetworkEventSink;
use async_trait::async_trait;
use shadow_core::{FunctionalMode, RegistrationStatus};
use std::sync::{Arc, Mutex};

/// Mock network stack.
///
/// Records every functional mode request and lets tests inject network
/// events once `connect_async()` has handed over the sink.
#[derive(Debug)]
pub struct MockModem {
    inner: Arc<Mutex<MockModemInner>>,
}

#[derive(Debug)]
struct MockModemInner {
    mode: FunctionalMode,
    sink: Option<NetworkEventSink>,
    auto_register: Option<RegistrationStatus>,
    init_calls: usize,
    connect_calls: usize,
    mode_requests: Vec<FunctionalMode>,
    fail_next_init: Option<String>,
    fail_next_connect: Option<String>,
    fail_next_mode: Option<String>,
}

impl Default for MockModem {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockModemInner {
                mode: FunctionalMode::PowerOff,
                sink: None,
                auto_register: None,
                init_calls: 0,
                connect_calls: 0,
                mode_requests: Vec::new(),
                fail_next_init: None,
                fail_next_connect: None,
                fail_next_mode: None,
            })),
        }
    }
}

impl MockModem {
    /// Create a modem that never registers on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `status` as soon as `connect_async()` is called.
    pub fn with_auto_register(self, status: RegistrationStatus) -> Self {
        self.inner.lock().unwrap().auto_register = Some(status);
        self
    }

    /// Deliver an event through the registered sink.
    ///
    /// Returns false if nobody called `connect_async()` yet.
    pub fn emit(&self, event: NetworkEvent) -> bool {
        let sink = self.inner.lock().unwrap().sink.clone();
        match sink {
            Some(sink) => {
                sink.deliver(event);
                true
            }
            None => false,
        }
    }

    /// Current functional mode.
    pub fn mode(&self) -> FunctionalMode {
        self.inner.lock().unwrap().mode
    }

    /// Force the functional mode without recording a request.
    pub fn set_mode(&self, mode: FunctionalMode) {
        self.inner.lock().unwrap().mode = mode;
    }

    /// Every `set_functional_mode()` request, including failed ones.
    pub fn mode_requests(&self) -> Vec<FunctionalMode> {
        self.inner.lock().unwrap().mode_requests.clone()
    }

    /// Number of `initialize()` calls.
    pub fn init_calls(&self) -> usize {
        self.inner.lock().unwrap().init_calls
    }

    /// Number of blocking `connect()` calls.
    pub fn connect_calls(&self) -> usize {
        self.inner.lock().unwrap().connect_calls
    }

    /// Cause the next initialize() to fail with the given error.
    pub fn fail_next_init(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_init = Some(error.to_string());
    }

    /// Cause the next connect() or connect_async() to fail.
    pub fn fail_next_connect(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_connect = Some(error.to_string());
    }

    /// Cause the next set_functional_mode() to fail.
    pub fn fail_next_mode(&self, error: &str) {
        self.inner.lock().unwrap().fail_next_mode = Some(error.to_string());
    }
}

impl Clone for MockModem {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl NetworkStack for MockModem {
    async fn initialize(&self) -> Result<(), ConnectivityError> {
        let mut inner = self.inner.lock().unwrap();
        inner.init_calls += 1;

        if let Some(error) = inner.fail_next_init.take() {
            return Err(ConnectivityError::InitFailed(error));
        }
        Ok(())
    }

    async fn connect_async(&self, sink: NetworkEventSink) -> Result<(), ConnectivityError> {
        let auto_register = {
            let mut inner = self.inner.lock().unwrap();

            if let Some(error) = inner.fail_next_connect.take() {
                return Err(ConnectivityError::ConnectFailed(error));
            }

            inner.mode = FunctionalMode::Normal;
            inner.sink = Some(sink.clone());
            inner.auto_register
        };

        if let Some(status) = auto_register {
            sink.deliver(NetworkEvent::RegistrationStatus(status));
        }
        Ok(())
    }

    async fn connect(&self) -> Result<(), ConnectivityError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connect_calls += 1;

        if let Some(error) = inner.fail_next_connect.take() {
            return Err(ConnectivityError::ConnectFailed(error));
        }

        inner.mode = FunctionalMode::Normal;
        Ok(())
    }

    async fn functional_mode(&self) -> Result<FunctionalMode, ConnectivityError> {
        Ok(self.inner.lock().unwrap().mode)
    }

    async fn set_functional_mode(&self, mode: FunctionalMode) -> Result<(), ConnectivityError> {
        let mut inner = self.inner.lock().unwrap();
        inner.mode_requests.push(mode);

        if let Some(error) = inner.fail_next_mode.take() {
            return Err(ConnectivityError::ModeFailed(error));
        }

        inner.mode = mode;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DeviceEvent;
    use crate::network::RrcMode;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn connect_async_auto_registers() {
        let modem = MockModem::new().with_auto_register(RegistrationStatus::RegisteredRoaming);
        let (tx, mut rx) = mpsc::channel(4);

        modem.connect_async(NetworkEventSink::new(tx)).await.unwrap();

        assert_eq!(modem.mode(), FunctionalMode::Normal);
        assert_eq!(
            rx.recv().await,
            Some(DeviceEvent::Network(NetworkEvent::RegistrationStatus(
                RegistrationStatus::RegisteredRoaming
            )))
        );
    }

    #[tokio::test]
    async fn emit_needs_a_sink() {
        let modem = MockModem::new();
        assert!(!modem.emit(NetworkEvent::RrcModeChange(RrcMode::Idle)));

        let (tx, mut rx) = mpsc::channel(4);
        modem.connect_async(NetworkEventSink::new(tx)).await.unwrap();
        assert!(modem.emit(NetworkEvent::CellChange {
            cell_id: 0x1234,
            tracking_area: 7,
        }));
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn failed_mode_request_is_recorded() {
        let modem = MockModem::new();
        modem.set_mode(FunctionalMode::Normal);
        modem.fail_next_mode("busy");

        let result = modem.set_functional_mode(FunctionalMode::Offline).await;

        assert!(matches!(result, Err(ConnectivityError::ModeFailed(_))));
        assert_eq!(modem.mode(), FunctionalMode::Normal);
        assert_eq!(modem.mode_requests(), vec![FunctionalMode::Offline]);
    }

    #[tokio::test]
    async fn forced_init_failure() {
        let modem = MockModem::new();
        modem.fail_next_init("no modem firmware");

        assert!(modem.initialize().await.is_err());
        assert!(modem.initialize().await.is_ok());
        assert_eq!(modem.init_calls(), 2);
    }
}
