//! Device-side effect of an applied config.

use shadow_types::DesiredConfig;
use std::sync::{Arc, Mutex};

/// Receives every config the engine applies.
///
/// Implementations drive the actual device output. Applying must not fail:
/// once the engine accepts a config it is considered applied.
pub trait ConfigSink: Send + Sync {
    /// Show the new config on the device.
    fn apply(&mut self, config: &DesiredConfig);
}

/// Sink that only logs the new display text.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDisplay;

impl ConfigSink for LogDisplay {
    fn apply(&mut self, config: &DesiredConfig) {
        tracing::info!(display = %config.display, "display updated");
    }
}

/// Sink that records every applied display text. Clones share history.
#[derive(Debug, Default, Clone)]
pub struct MemoryDisplay {
    shown: Arc<Mutex<Vec<String>>>,
}

impl MemoryDisplay {
    /// Create an empty display.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything shown so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }

    /// The text currently shown.
    pub fn current(&self) -> Option<String> {
        self.shown.lock().unwrap().last().cloned()
    }
}

impl ConfigSink for MemoryDisplay {
    fn apply(&mut self, config: &DesiredConfig) {
        self.shown.lock().unwrap().push(config.display.clone());
    }
}
