//! Callback-to-task bridge.
//!
//! Modem and provisioning callbacks run in contexts that must not block, so
//! they only enqueue a [`DeviceEvent`]; the coordinator's event pump does
//! all the work. Sinks never wait: when the queue is full the event is
//! dropped and logged. The one exception is a provisioning `Stop` or `Done`,
//! which is parked in a single slot the pump also watches.

use std::sync::Arc;

use shadow_core::ProvisioningEvent;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;

use crate::network::NetworkEvent;

/// An event waiting for the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// From the network stack.
    Network(NetworkEvent),
    /// From the provisioning client.
    Provisioning(ProvisioningEvent),
}

fn deliver(tx: &mpsc::Sender<DeviceEvent>, event: DeviceEvent) {
    if let Err(e) = tx.try_send(event) {
        log_dropped(e);
    }
}

fn log_dropped(err: TrySendError<DeviceEvent>) {
    match err {
        TrySendError::Full(event) => {
            tracing::warn!("event queue full, dropping {:?}", event);
        }
        TrySendError::Closed(event) => {
            tracing::debug!("event pump gone, dropping {:?}", event);
        }
    }
}

/// Handle given to the network stack for registration and cell callbacks.
#[derive(Debug, Clone)]
pub struct NetworkEventSink {
    tx: mpsc::Sender<DeviceEvent>,
}

impl NetworkEventSink {
    /// Wrap the coordinator's queue.
    pub fn new(tx: mpsc::Sender<DeviceEvent>) -> Self {
        Self { tx }
    }

    /// Enqueue a network event. Never blocks.
    pub fn deliver(&self, event: NetworkEvent) {
        deliver(&self.tx, DeviceEvent::Network(event));
    }
}

/// Handle given to the provisioning client for lifecycle callbacks.
///
/// `Stop` and `Done` end the coordinator's wait for provisioning, so they
/// are never lost to a full queue: they fall back to a parked slot, where
/// `Done` is never overwritten by a later `Stop`.
#[derive(Debug, Clone)]
pub struct ProvisioningEventSink {
    tx: mpsc::Sender<DeviceEvent>,
    parked: Arc<watch::Sender<Option<ProvisioningEvent>>>,
}

impl ProvisioningEventSink {
    /// Wrap the coordinator's queue.
    pub fn new(tx: mpsc::Sender<DeviceEvent>) -> Self {
        let (parked, _) = watch::channel(None);
        Self {
            tx,
            parked: Arc::new(parked),
        }
    }

    /// Watch the parked slot. Only events delivered after this call are seen.
    pub fn parked_events(&self) -> watch::Receiver<Option<ProvisioningEvent>> {
        self.parked.subscribe()
    }

    /// Enqueue a provisioning event. Never blocks.
    pub fn deliver(&self, event: ProvisioningEvent) {
        match self.tx.try_send(DeviceEvent::Provisioning(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) if is_terminal(event) => {
                tracing::warn!("event queue full, parking {:?}", event);
                self.parked.send_if_modified(|slot| {
                    if *slot == Some(ProvisioningEvent::Done) {
                        return false;
                    }
                    *slot = Some(event);
                    true
                });
            }
            Err(e) => log_dropped(e),
        }
    }
}

fn is_terminal(event: ProvisioningEvent) -> bool {
    matches!(event, ProvisioningEvent::Stop | ProvisioningEvent::Done)
}
