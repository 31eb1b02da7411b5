//! The operator input loop.
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────── interrupt ────────────┐
//!                ▼                                    │
//! InputSource ──► InputPipeline ──validate()──► CodeValidator
//!                     │   (awaited inline, one at a time)
//!                     │
//!                     └──request_pulse()──► RelayHandle ──► relay worker
//!                          (never awaited)
//! ```
//!
//! Validations run strictly in input order. A pulse is queued on the relay
//! worker and the loop goes straight back to reading, so the next code can
//! be validated while the relay is still energized.
//!
//! The loop ends on a quit token, end of input, an interrupt, or an input
//! read error. Whichever it is, the relay worker is shut down and the line
//! released exactly once before [`InputPipeline::run`] returns. Pulses still
//! queued at that point are run, except after an interrupt, where they are
//! dropped and only the pulse in progress completes.

use crate::error::AgentError;
use crate::filter::CodeFilter;
use crate::input::{InputCommand, InputSource};
use crate::state_machine::{PipelineState, StateMachine};
use gatepulse_core::{Code, PulseOrigin, StatusSignal, StatusSink};
use gatepulse_hardware::{PendingPulses, PulseStats, RelayHandle};
use gatepulse_network::{CodeValidator, ValidationOutcome};
use std::fmt;
use std::future::Future;
use tracing::{debug, error, info, warn};

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A quit token was entered.
    Quit,

    /// The input source was exhausted.
    EndOfInput,

    /// The shutdown future resolved (Ctrl-C).
    Interrupted,

    /// The input source failed.
    InputError(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quit => write!(f, "quit requested"),
            Self::EndOfInput => write!(f, "end of input"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::InputError(e) => write!(f, "input error: {e}"),
        }
    }
}

/// Per-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCounts {
    /// Codes sent to the validator.
    pub validations: u64,
    pub accepted: u64,
    pub denied: u64,
    /// Codes refused locally by the prefix filter.
    pub filtered: u64,
    /// Pulses accepted by the relay worker queue.
    pub pulses_requested: u64,
}

/// Summary returned when the loop ends.
#[derive(Debug)]
pub struct PipelineReport {
    pub reason: StopReason,
    pub counts: PipelineCounts,
    /// Relay worker counters at the moment the loop ended.
    pub pulse_stats: PulseStats,
    /// Outcome of releasing the relay line.
    pub cleanup: Result<(), AgentError>,
}

enum Step {
    Continue,
    Stop(StopReason),
}

/// Reads codes, validates them and triggers the relay.
pub struct InputPipeline<S, V> {
    source: S,
    validator: V,
    relay: RelayHandle,
    filter: CodeFilter,
    machine: StateMachine,
    status: StatusSink,
    counts: PipelineCounts,
}

impl<S: InputSource, V: CodeValidator> InputPipeline<S, V> {
    pub fn new(source: S, validator: V, relay: RelayHandle, status: StatusSink) -> Self {
        Self {
            source,
            validator,
            relay,
            filter: CodeFilter::allow_all(),
            machine: StateMachine::new(),
            status,
            counts: PipelineCounts::default(),
        }
    }

    /// Refuse codes outside `filter` without validating them.
    pub fn with_filter(mut self, filter: CodeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Run until quit, end of input, input failure, or `shutdown` resolves.
    ///
    /// Consumes the pipeline: the relay is released on the way out and
    /// cannot be used again.
    pub async fn run<F>(mut self, shutdown: F) -> PipelineReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            filtered = self.filter.is_restrictive(),
            "Input pipeline started"
        );
        self.status.emit(StatusSignal::Ready);

        let reason = loop {
            let step = tokio::select! {
                biased;
                () = &mut shutdown => Step::Stop(StopReason::Interrupted),
                step = self.step() => step,
            };
            if let Step::Stop(reason) = step {
                break reason;
            }
        };

        info!(%reason, "Input pipeline stopping");
        self.enter(PipelineState::ShuttingDown);

        // After an interrupt only the pulse already in progress finishes.
        let pending = match reason {
            StopReason::Interrupted => PendingPulses::Discard,
            _ => PendingPulses::Complete,
        };
        let pulse_stats = self.relay.stats();
        let cleanup = self.relay.shutdown(pending).await.map_err(AgentError::from);
        match &cleanup {
            Ok(()) => info!("Relay released"),
            Err(e) => error!(error = %e, "Relay release failed"),
        }

        PipelineReport {
            reason,
            counts: self.counts,
            pulse_stats,
            cleanup,
        }
    }

    async fn step(&mut self) -> Step {
        let line = match self.source.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Step::Stop(StopReason::EndOfInput),
            Err(e) => {
                error!(error = %e, "Failed to read input");
                return Step::Stop(StopReason::InputError(e.to_string()));
            }
        };

        match InputCommand::parse(&line) {
            InputCommand::Quit => Step::Stop(StopReason::Quit),
            InputCommand::Empty => {
                self.status.emit(StatusSignal::Ready);
                Step::Continue
            }
            InputCommand::TestPulse => {
                info!("Relay test requested");
                self.enter(PipelineState::ActuatingAsync);
                self.request_pulse(PulseOrigin::Diagnostic);
                self.await_input();
                Step::Continue
            }
            InputCommand::Code(code) => {
                self.handle_code(code).await;
                Step::Continue
            }
        }
    }

    async fn handle_code(&mut self, code: Code) {
        if !self.filter.permits(&code) {
            info!(%code, "Code does not match a permitted prefix");
            self.counts.filtered += 1;
            self.status.emit(StatusSignal::CodeFiltered {
                code: code.to_string(),
            });
            self.enter(PipelineState::Idle);
            self.await_input();
            return;
        }

        self.enter(PipelineState::Validating);
        self.counts.validations += 1;
        self.status.emit(StatusSignal::ValidationStarted {
            code: code.to_string(),
        });
        debug!(%code, "Validating code");

        match self.validator.validate(&code).await {
            ValidationOutcome::Valid { detail } => {
                info!(%code, "Code accepted");
                self.counts.accepted += 1;
                self.status.emit(StatusSignal::CodeAccepted {
                    code: code.to_string(),
                    detail,
                });
                self.enter(PipelineState::ActuatingAsync);
                self.request_pulse(PulseOrigin::Validated);
            }
            outcome => {
                let reason = outcome.denial_reason().unwrap_or_default();
                info!(%code, %reason, "Code denied");
                self.counts.denied += 1;
                self.status.emit(StatusSignal::denied(&code, reason));
                self.enter(PipelineState::Idle);
            }
        }
        self.await_input();
    }

    fn request_pulse(&mut self, origin: PulseOrigin) {
        if self.relay.request_pulse(origin) {
            self.counts.pulses_requested += 1;
        }
    }

    fn await_input(&mut self) {
        self.enter(PipelineState::AwaitingInput);
        self.status.emit(StatusSignal::Ready);
    }

    fn enter(&mut self, state: PipelineState) {
        if let Err(e) = self.machine.transition_to(state) {
            warn!(error = %e, "Unexpected pipeline transition");
        }
    }
}

impl<S, V> fmt::Debug for InputPipeline<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputPipeline")
            .field("state", &self.machine.current_state())
            .field("filter", &self.filter)
            .field("counts", &self.counts)
            .finish_non_exhaustive()
    }
}
