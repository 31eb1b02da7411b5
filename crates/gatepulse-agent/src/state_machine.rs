//! Input pipeline state machine.
//!
//! Tracks where the read loop is in handling one line of input and rejects
//! transitions the loop should never make.
//!
//! # States
//!
//! - `AwaitingInput`: waiting for the next line
//! - `Validating`: a code is being checked with the validation service
//! - `ActuatingAsync`: a pulse has been handed to the relay worker
//! - `Idle`: a code was refused (or filtered), nothing to actuate
//! - `ShuttingDown`: terminal, the relay is being released
//!
//! # Valid Transitions
//!
//! - AwaitingInput → Validating → ActuatingAsync/Idle → AwaitingInput
//! - AwaitingInput → ActuatingAsync (diagnostic `test` token)
//! - AwaitingInput → Idle (code filtered locally)
//! - any non-terminal state → ShuttingDown
//!
//! `ActuatingAsync` is left as soon as the pulse is queued; the pulse itself
//! runs on the relay worker while the loop goes back to reading.
//!
//! # Examples
//!
//! ```
//! use gatepulse_agent::{PipelineState, StateMachine};
//!
//! let mut machine = StateMachine::new();
//! assert_eq!(machine.current_state(), PipelineState::AwaitingInput);
//!
//! machine.transition_to(PipelineState::Validating).unwrap();
//! machine.transition_to(PipelineState::ActuatingAsync).unwrap();
//! machine.transition_to(PipelineState::AwaitingInput).unwrap();
//!
//! // A validation cannot start while one is running
//! machine.transition_to(PipelineState::Validating).unwrap();
//! assert!(machine.transition_to(PipelineState::Validating).is_err());
//! ```

use gatepulse_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Maximum number of state transitions to keep in history.
const MAX_HISTORY_SIZE: usize = 100;

/// Phase of the read loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Waiting for the next line of input.
    #[default]
    AwaitingInput,

    /// A code is being checked with the validation service.
    Validating,

    /// A pulse request was handed to the relay worker.
    ActuatingAsync,

    /// The last input produced no actuation.
    Idle,

    /// The loop has ended and the relay is being released.
    ShuttingDown,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingInput => "AwaitingInput",
            Self::Validating => "Validating",
            Self::ActuatingAsync => "ActuatingAsync",
            Self::Idle => "Idle",
            Self::ShuttingDown => "ShuttingDown",
        };
        f.write_str(name)
    }
}

impl PipelineState {
    /// Check whether moving from this state to `target` is allowed.
    pub fn can_transition_to(self, target: PipelineState) -> bool {
        use PipelineState::*;

        match (self, target) {
            (ShuttingDown, _) => false,
            (_, ShuttingDown) => true,
            (AwaitingInput, Validating | ActuatingAsync | Idle) => true,
            (Validating, ActuatingAsync | Idle) => true,
            (ActuatingAsync | Idle, AwaitingInput) => true,
            _ => false,
        }
    }

    /// Returns `true` for the terminal state.
    pub fn is_terminal(self) -> bool {
        self == Self::ShuttingDown
    }
}

/// A recorded state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: PipelineState,
    pub to: PipelineState,
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: PipelineState, to: PipelineState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }
}

/// State machine guarding the read loop.
///
/// Not thread-safe; owned by the pipeline task.
#[derive(Debug)]
pub struct StateMachine {
    current_state: PipelineState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a machine in `AwaitingInput`.
    pub fn new() -> Self {
        Self {
            current_state: PipelineState::AwaitingInput,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> PipelineState {
        self.current_state
    }

    /// Time spent in the current state.
    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// The last `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).copied().collect()
    }

    /// Move to `new_state`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the move is not allowed;
    /// the machine is left unchanged.
    pub fn transition_to(&mut self, new_state: PipelineState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.current_state = new_state;
        self.state_entered_at = transition.timestamp;

        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }

        Ok(transition)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use PipelineState::*;

    #[test]
    fn test_new_machine_awaits_input() {
        let machine = StateMachine::new();
        assert_eq!(machine.current_state(), AwaitingInput);
        assert!(machine.history().is_empty());
    }

    #[rstest]
    #[case(AwaitingInput, Validating)]
    #[case(AwaitingInput, ActuatingAsync)]
    #[case(AwaitingInput, Idle)]
    #[case(AwaitingInput, ShuttingDown)]
    #[case(Validating, ActuatingAsync)]
    #[case(Validating, Idle)]
    #[case(Validating, ShuttingDown)]
    #[case(ActuatingAsync, AwaitingInput)]
    #[case(Idle, AwaitingInput)]
    fn test_valid_transitions(#[case] from: PipelineState, #[case] to: PipelineState) {
        assert!(from.can_transition_to(to), "{from} -> {to}");
    }

    #[rstest]
    #[case(AwaitingInput, AwaitingInput)]
    #[case(Validating, Validating)]
    #[case(Validating, AwaitingInput)]
    #[case(Idle, ActuatingAsync)]
    #[case(ActuatingAsync, Validating)]
    #[case(ShuttingDown, AwaitingInput)]
    #[case(ShuttingDown, ShuttingDown)]
    fn test_invalid_transitions(#[case] from: PipelineState, #[case] to: PipelineState) {
        assert!(!from.can_transition_to(to), "{from} -> {to}");
    }

    #[test]
    fn test_rejected_transition_leaves_state() {
        let mut machine = StateMachine::new();
        let err = machine.transition_to(AwaitingInput).unwrap_err();

        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(machine.current_state(), AwaitingInput);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_history_and_last_transitions() {
        let mut machine = StateMachine::new();
        machine.transition_to(Validating).unwrap();
        machine.transition_to(Idle).unwrap();
        machine.transition_to(AwaitingInput).unwrap();

        let last = machine.last_transitions(2);
        assert_eq!(last.len(), 2);
        assert_eq!((last[0].from, last[0].to), (Validating, Idle));
        assert_eq!((last[1].from, last[1].to), (Idle, AwaitingInput));
        assert_eq!(machine.last_transitions(10).len(), 3);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = StateMachine::new();
        for _ in 0..MAX_HISTORY_SIZE {
            machine.transition_to(ActuatingAsync).unwrap();
            machine.transition_to(AwaitingInput).unwrap();
        }
        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
    }

    #[test]
    fn test_terminal() {
        let mut machine = StateMachine::new();
        machine.transition_to(ShuttingDown).unwrap();
        assert!(machine.current_state().is_terminal());
        assert!(machine.transition_to(AwaitingInput).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_in_state() {
        let mut machine = StateMachine::new();
        machine.transition_to(Validating).unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(machine.time_in_current_state(), Duration::from_millis(250));
    }
}
