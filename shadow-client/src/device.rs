//! Device control.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Platform hooks that end the current run.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Restart the device. On hardware this does not return.
    async fn restart(&self);
}

/// Mock device that counts restart requests.
#[derive(Debug, Default, Clone)]
pub struct MockDevice {
    restarts: Arc<AtomicUsize>,
}

impl MockDevice {
    /// Create a new mock device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of restart requests.
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceControl for MockDevice {
    async fn restart(&self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }
}
