//! ShadowEngine - the shadow synchronization loop.
//!
//! # Architecture
//!
//! The engine uses the pure [`EngineState`] machine from shadow-core for
//! every decision and interprets its actions to perform I/O through the
//! [`ShadowAdapter`].
//!
//! ```text
//! PollSignal → ShadowEngine → ShadowAdapter → CloudTransport
//!                   ↓
//!            shadow-core (pure state machine)
//! ```
//!
//! Failures inside a poll cycle never escape: each one ends the cycle with
//! a logged [`CycleOutcome`] and the engine goes back to waiting. Only
//! startup failures are returned to the caller.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;

use shadow_core::{CycleOutcome, EngineAction, EngineEvent, EngineState, StartupFailure};
use shadow_types::{codec, DesiredConfig, ReportedConfig};
use thiserror::Error;

use crate::adapter::{SessionPolicy, ShadowAdapter, DEFAULT_BUFFER_CAPACITY};
use crate::display::ConfigSink;
use crate::signal::PollSignal;
use crate::transport::CloudTransport;

/// Default time between polls (57 minutes).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(57 * 60);

/// Engine startup errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The cloud session could not be opened.
    #[error("cloud session unavailable: {0}")]
    Session(String),

    /// The initial reported document was not accepted.
    #[error("initial report failed: {0}")]
    InitialReport(String),
}

impl From<StartupFailure> for EngineError {
    fn from(failure: StartupFailure) -> Self {
        match failure {
            StartupFailure::Session { error } => EngineError::Session(error),
            StartupFailure::InitialReport { error } => EngineError::InitialReport(error),
        }
    }
}

/// A device message sent after every poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    /// Application endpoint.
    pub app_id: String,
    /// Message body.
    pub message: String,
    /// Request delivery confirmation.
    pub confirmable: bool,
}

/// Configuration for ShadowEngine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Time between polls.
    pub poll_interval: Duration,
    /// Receive buffer for deltas, in bytes.
    pub buffer_capacity: usize,
    /// When the cloud session is closed.
    pub session_policy: SessionPolicy,
    /// Optional message sent after every cycle.
    pub heartbeat: Option<Heartbeat>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            session_policy: SessionPolicy::default(),
            heartbeat: None,
        }
    }
}

impl EngineConfig {
    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the session policy.
    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session_policy = policy;
        self
    }

    /// Send a heartbeat message after every cycle.
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }
}

/// Where a run of the machine came to rest.
enum Settled {
    Ready,
    Halted(StartupFailure),
    Cycle(CycleOutcome),
}

/// Result of executing one action.
enum Step {
    Next(EngineEvent),
    Settled(Settled),
    Done,
}

/// The shadow synchronization engine.
///
/// Owns the applied config and every delta it fetches; nothing else in the
/// process touches them.
pub struct ShadowEngine<T: CloudTransport> {
    config: EngineConfig,
    adapter: ShadowAdapter<T>,
    state: EngineState,
    current: DesiredConfig,
    sink: Box<dyn ConfigSink>,
    cycles: u64,
}

impl<T: CloudTransport> std::fmt::Debug for ShadowEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowEngine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("current", &self.current)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl<T: CloudTransport> ShadowEngine<T> {
    /// Create a new engine. It does nothing until [`start`](Self::start).
    pub fn new(transport: T, config: EngineConfig, sink: Box<dyn ConfigSink>) -> Self {
        let adapter = ShadowAdapter::new(transport, config.buffer_capacity);
        Self {
            config,
            adapter,
            state: EngineState::new(),
            current: DesiredConfig::default(),
            sink,
            cycles: 0,
        }
    }

    /// Current machine state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The config applied most recently.
    pub fn current_config(&self) -> &DesiredConfig {
        &self.current
    }

    /// Number of poll cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Open the session and publish the initial empty report.
    ///
    /// Calling this on an engine that already started is a no-op.
    pub async fn start(&mut self) -> Result<(), EngineError> {
        tracing::info!("Shadow engine starting");

        match self.dispatch(EngineEvent::Start).await {
            Some(Settled::Halted(failure)) => {
                let err = EngineError::from(failure);
                tracing::error!("Shadow engine startup failed: {}", err);
                Err(err)
            }
            Some(Settled::Ready) => {
                tracing::info!("Shadow engine ready, initial report published");
                Ok(())
            }
            Some(Settled::Cycle(_)) | None => {
                tracing::debug!("start ignored in state {:?}", self.state);
                Ok(())
            }
        }
    }

    /// Run one poll cycle now.
    ///
    /// Returns `None` if the engine is not idle (e.g. not started yet).
    pub async fn run_cycle(&mut self) -> Option<CycleOutcome> {
        let Some(Settled::Cycle(outcome)) = self.dispatch(EngineEvent::PollDue).await else {
            tracing::debug!("poll ignored in state {:?}", self.state);
            return None;
        };

        self.cycles += 1;
        self.log_outcome(&outcome);
        self.send_heartbeat().await;

        if self.config.session_policy == SessionPolicy::PerCycle {
            if let Err(e) = self.adapter.close_session().await {
                tracing::warn!("failed to close cloud session: {}", e);
            }
        }

        Some(outcome)
    }

    /// Wait for the next poll signal, then run one cycle.
    pub async fn next_cycle(&mut self, signal: &PollSignal) -> Option<CycleOutcome> {
        signal.wait().await;
        self.run_cycle().await
    }

    /// Poll forever.
    ///
    /// Call [`start`](Self::start) first; polls that arrive before startup
    /// finished are ignored.
    pub async fn run(mut self, signal: PollSignal) -> Infallible {
        loop {
            self.next_cycle(&signal).await;
        }
    }

    /// Feed an event into the machine and execute actions until it settles.
    async fn dispatch(&mut self, first: EngineEvent) -> Option<Settled> {
        let mut pending = VecDeque::from([first]);
        let mut settled = None;

        while let Some(event) = pending.pop_front() {
            let (next, actions) = self.state.on_event(event);
            if next != self.state {
                tracing::trace!("engine {:?} -> {:?}", self.state, next);
            }
            self.state = next;

            for action in actions {
                match self.execute(action).await {
                    Step::Next(event) => pending.push_back(event),
                    Step::Settled(s) => settled = Some(s),
                    Step::Done => {}
                }
            }
        }

        settled
    }

    async fn execute(&mut self, action: EngineAction) -> Step {
        match action {
            EngineAction::EnsureSession => match self.adapter.ensure_session().await {
                Ok(()) => Step::Next(EngineEvent::SessionEstablished),
                Err(e) => Step::Next(EngineEvent::SessionFailed {
                    error: e.to_string(),
                }),
            },

            EngineAction::FetchDelta => {
                if let Err(e) = self.adapter.ensure_session().await {
                    return Step::Next(EngineEvent::FetchFailed {
                        error: e.to_string(),
                    });
                }
                match self.adapter.fetch_delta().await {
                    Ok(Some(delta)) => Step::Next(EngineEvent::DeltaFetched { delta }),
                    Ok(None) => Step::Next(EngineEvent::NoDelta),
                    Err(e) => Step::Next(EngineEvent::FetchFailed {
                        error: e.to_string(),
                    }),
                }
            }

            // The delta is dropped at the end of this arm whatever the result.
            EngineAction::DecodeDelta { delta } => match codec::decode(&delta.body) {
                Ok(config) => Step::Next(EngineEvent::Decoded { config }),
                Err(e) => Step::Next(EngineEvent::DecodeFailed {
                    error: e.to_string(),
                }),
            },

            EngineAction::ApplyConfig { config } => {
                self.sink.apply(&config);
                self.current = config;
                Step::Done
            }

            EngineAction::PublishReport => {
                let report = ReportedConfig::from(&self.current);
                let doc = match codec::encode(&report) {
                    Ok(doc) => doc,
                    Err(e) => {
                        return Step::Next(EngineEvent::ReportFailed {
                            error: e.to_string(),
                        })
                    }
                };
                match self.adapter.publish_report(&doc).await {
                    Ok(()) => Step::Next(EngineEvent::ReportPublished),
                    Err(e) => Step::Next(EngineEvent::ReportFailed {
                        error: e.to_string(),
                    }),
                }
            }

            EngineAction::Ready => Step::Settled(Settled::Ready),
            EngineAction::Halt { failure } => Step::Settled(Settled::Halted(failure)),
            EngineAction::CompleteCycle { outcome } => Step::Settled(Settled::Cycle(outcome)),
        }
    }

    async fn send_heartbeat(&mut self) {
        let Some(heartbeat) = &self.config.heartbeat else {
            return;
        };

        match self
            .adapter
            .send_message(
                &heartbeat.app_id,
                heartbeat.message.as_bytes(),
                heartbeat.confirmable,
            )
            .await
        {
            Ok(()) => tracing::debug!("heartbeat sent to {}", heartbeat.app_id),
            Err(e) => tracing::warn!("heartbeat to {} failed: {}", heartbeat.app_id, e),
        }
    }

    fn log_outcome(&self, outcome: &CycleOutcome) {
        let cycle = self.cycles;
        match outcome {
            CycleOutcome::Applied => {
                tracing::info!(cycle, display = %self.current.display, "shadow config applied and reported")
            }
            CycleOutcome::NoChange => tracing::debug!(cycle, "no pending shadow change"),
            CycleOutcome::FetchFailed { error } => {
                tracing::warn!(cycle, "poll cycle abandoned, fetch failed: {}", error)
            }
            CycleOutcome::UnsupportedFormat { format } => {
                tracing::warn!(cycle, "poll cycle abandoned, unsupported delta format: {}", format)
            }
            CycleOutcome::DecodeFailed { error } => {
                tracing::warn!(cycle, "poll cycle abandoned, invalid delta: {}", error)
            }
            CycleOutcome::PublishFailed { error } => {
                tracing::warn!(
                    cycle,
                    display = %self.current.display,
                    "config applied but report failed: {}",
                    error
                )
            }
        }
    }
}
