//! Shadow synchronization state machine.
//!
//! Models one engine: a startup phase that opens the cloud session and
//! publishes the initial (empty) reported document, then an endless series
//! of poll cycles `Idle → Fetching → Applying → Reporting → Idle`.
//!
//! Every failure inside a cycle returns the machine to `Idle` with a
//! [`CycleOutcome`] describing why the cycle was abandoned. Only failures
//! while `Initializing` halt the machine.

use shadow_types::{DesiredConfig, PayloadFormat, ShadowDelta};

/// Engine state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Opening the session and publishing the initial report.
    #[default]
    Initializing,
    /// Waiting for the next poll signal.
    Idle,
    /// A delta fetch is in flight.
    Fetching,
    /// Decoding and applying a fetched delta.
    Applying,
    /// Publishing the applied config back to the cloud.
    Reporting,
}

impl EngineState {
    /// Create a new state machine in the Initializing state.
    pub fn new() -> Self {
        Self::Initializing
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// Events that make no sense in the current state are ignored: the
    /// state is kept and no action is produced. In particular a `PollDue`
    /// that arrives mid-cycle does nothing.
    pub fn on_event(self, event: EngineEvent) -> (Self, Vec<EngineAction>) {
        match (self, event) {
            // Startup
            (Self::Initializing, EngineEvent::Start) => {
                (Self::Initializing, vec![EngineAction::EnsureSession])
            }
            (Self::Initializing, EngineEvent::SessionEstablished) => {
                (Self::Initializing, vec![EngineAction::PublishReport])
            }
            (Self::Initializing, EngineEvent::SessionFailed { error }) => (
                Self::Initializing,
                vec![EngineAction::Halt {
                    failure: StartupFailure::Session { error },
                }],
            ),
            (Self::Initializing, EngineEvent::ReportPublished) => {
                (Self::Idle, vec![EngineAction::Ready])
            }
            (Self::Initializing, EngineEvent::ReportFailed { error }) => (
                Self::Initializing,
                vec![EngineAction::Halt {
                    failure: StartupFailure::InitialReport { error },
                }],
            ),

            // From Idle
            (Self::Idle, EngineEvent::PollDue) => (Self::Fetching, vec![EngineAction::FetchDelta]),

            // From Fetching
            (Self::Fetching, EngineEvent::DeltaFetched { delta }) => {
                if delta.is_empty() {
                    (Self::Idle, complete(CycleOutcome::NoChange))
                } else if !delta.format.is_supported() {
                    (
                        Self::Idle,
                        complete(CycleOutcome::UnsupportedFormat {
                            format: delta.format,
                        }),
                    )
                } else {
                    (Self::Applying, vec![EngineAction::DecodeDelta { delta }])
                }
            }
            (Self::Fetching, EngineEvent::NoDelta) => (Self::Idle, complete(CycleOutcome::NoChange)),
            (Self::Fetching, EngineEvent::FetchFailed { error }) => {
                (Self::Idle, complete(CycleOutcome::FetchFailed { error }))
            }

            // From Applying
            (Self::Applying, EngineEvent::Decoded { config }) => (
                Self::Reporting,
                vec![
                    EngineAction::ApplyConfig { config },
                    EngineAction::PublishReport,
                ],
            ),
            (Self::Applying, EngineEvent::DecodeFailed { error }) => {
                (Self::Idle, complete(CycleOutcome::DecodeFailed { error }))
            }

            // From Reporting
            (Self::Reporting, EngineEvent::ReportPublished) => {
                (Self::Idle, complete(CycleOutcome::Applied))
            }
            (Self::Reporting, EngineEvent::ReportFailed { error }) => {
                (Self::Idle, complete(CycleOutcome::PublishFailed { error }))
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the engine is waiting for a poll.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

fn complete(outcome: CycleOutcome) -> Vec<EngineAction> {
    vec![EngineAction::CompleteCycle { outcome }]
}

/// Events fed into the engine machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Begin startup.
    Start,
    /// The cloud session is open.
    SessionEstablished,
    /// The cloud session could not be opened.
    SessionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The poll timer fired.
    PollDue,
    /// The transport returned a delta.
    DeltaFetched {
        /// The fetched delta.
        delta: ShadowDelta,
    },
    /// The transport reported no pending change.
    NoDelta,
    /// The fetch failed.
    FetchFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The delta decoded into a config.
    Decoded {
        /// The decoded config.
        config: DesiredConfig,
    },
    /// The delta could not be decoded.
    DecodeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The reported document was accepted by the cloud.
    ReportPublished,
    /// Encoding or publishing the reported document failed.
    ReportFailed {
        /// Error message describing the failure.
        error: String,
    },
}

/// Actions to be executed by the engine driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    /// Open the cloud session if it is not open already.
    EnsureSession,
    /// Fetch the pending delta.
    FetchDelta,
    /// Decode a fetched delta.
    DecodeDelta {
        /// The delta to decode.
        delta: ShadowDelta,
    },
    /// Replace the current config and hand it to the device.
    ApplyConfig {
        /// The new config.
        config: DesiredConfig,
    },
    /// Encode the current config and publish it as the reported state.
    PublishReport,
    /// Startup finished; the engine now accepts polls.
    Ready,
    /// Startup failed; the engine cannot run.
    Halt {
        /// What went wrong.
        failure: StartupFailure,
    },
    /// A poll cycle finished.
    CompleteCycle {
        /// How the cycle ended.
        outcome: CycleOutcome,
    },
}

/// Why startup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupFailure {
    /// The cloud session could not be opened.
    Session {
        /// Error message describing the failure.
        error: String,
    },
    /// The initial empty report could not be published.
    InitialReport {
        /// Error message describing the failure.
        error: String,
    },
}

/// How a poll cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new config was applied and reported.
    Applied,
    /// Nothing was pending.
    NoChange,
    /// The fetch failed.
    FetchFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The delta arrived in a format the codec does not handle.
    UnsupportedFormat {
        /// The format the transport reported.
        format: PayloadFormat,
    },
    /// The delta was malformed.
    DecodeFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The config was applied but the report did not go out.
    PublishFailed {
        /// Error message describing the failure.
        error: String,
    },
}

impl CycleOutcome {
    /// Whether the cycle was abandoned because of an error.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed { .. }
                | Self::UnsupportedFormat { .. }
                | Self::DecodeFailed { .. }
                | Self::PublishFailed { .. }
        )
    }
}
