//! Validator abstraction and an in-memory implementation.

#![allow(async_fn_in_trait)]

use crate::error::ValidationFailure;
use crate::response::ValidationOutcome;
use gatepulse_core::Code;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Something that can decide whether a code grants access.
///
/// Implemented by [`ValidationClient`](crate::ValidationClient) for the real
/// service and by [`MockValidator`] for tests and bench runs.
pub trait CodeValidator: Send + Sync {
    /// Decide on `code`. Implementations never fail; problems are reported
    /// as [`ValidationOutcome::Error`].
    async fn validate(&self, code: &Code) -> ValidationOutcome;
}

#[derive(Debug)]
struct MockValidatorState {
    outcomes: HashMap<String, ValidationOutcome>,
    fallback: ValidationOutcome,
    latency: Duration,
    calls: Vec<String>,
    in_flight: u32,
    max_in_flight: u32,
}

/// Scripted validator.
///
/// Codes registered through the handle get their scripted outcome; every
/// other code gets the fallback (refused with `invalid_code` unless changed).
///
/// # Examples
///
/// ```
/// use gatepulse_core::Code;
/// use gatepulse_network::{CodeValidator, MockValidator, ValidationOutcome};
///
/// #[tokio::main]
/// async fn main() {
///     let (validator, handle) = MockValidator::new();
///     handle.accept("ABC123");
///
///     let code = Code::new("ABC123").unwrap();
///     assert!(validator.validate(&code).await.is_valid());
///     assert_eq!(handle.calls(), vec!["ABC123".to_string()]);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockValidator {
    state: Arc<Mutex<MockValidatorState>>,
}

impl MockValidator {
    /// Create a validator that refuses everything until scripted.
    pub fn new() -> (Self, MockValidatorHandle) {
        let state = Arc::new(Mutex::new(MockValidatorState {
            outcomes: HashMap::new(),
            fallback: ValidationOutcome::Invalid {
                message: "invalid_code".to_string(),
            },
            latency: Duration::ZERO,
            calls: Vec::new(),
            in_flight: 0,
            max_in_flight: 0,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockValidatorHandle { state },
        )
    }
}

impl CodeValidator for MockValidator {
    async fn validate(&self, code: &Code) -> ValidationOutcome {
        let latency = {
            let mut state = lock(&self.state);
            state.calls.push(code.as_str().to_string());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = lock(&self.state);
        state.in_flight -= 1;
        state
            .outcomes
            .get(code.as_str())
            .cloned()
            .unwrap_or_else(|| state.fallback.clone())
    }
}

/// Handle for scripting and inspecting a [`MockValidator`].
#[derive(Debug, Clone)]
pub struct MockValidatorHandle {
    state: Arc<Mutex<MockValidatorState>>,
}

impl MockValidatorHandle {
    /// Script the outcome for `code`.
    pub fn script(&self, code: &str, outcome: ValidationOutcome) {
        lock(&self.state)
            .outcomes
            .insert(code.to_string(), outcome);
    }

    /// Accept `code`.
    pub fn accept(&self, code: &str) {
        self.script(code, ValidationOutcome::Valid { detail: None });
    }

    /// Make `code` time out.
    pub fn time_out(&self, code: &str, after: Duration) {
        self.script(
            code,
            ValidationOutcome::Error(ValidationFailure::Timeout {
                ms: after.as_millis() as u64,
            }),
        );
    }

    /// Outcome for codes without a script.
    pub fn set_fallback(&self, outcome: ValidationOutcome) {
        lock(&self.state).fallback = outcome;
    }

    /// Simulated round-trip time for every call.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = latency;
    }

    /// Codes validated so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    /// Highest number of validations that were running at once.
    pub fn max_in_flight(&self) -> u32 {
        lock(&self.state).max_in_flight
    }
}

fn lock(state: &Mutex<MockValidatorState>) -> MutexGuard<'_, MockValidatorState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> Code {
        Code::new(raw).unwrap()
    }

    #[tokio::test]
    async fn test_fallback_refuses() {
        let (validator, handle) = MockValidator::new();
        let outcome = validator.validate(&code("XYZ")).await;

        assert_eq!(
            outcome,
            ValidationOutcome::Invalid {
                message: "invalid_code".to_string()
            }
        );
        assert_eq!(handle.calls(), vec!["XYZ"]);
    }

    #[tokio::test]
    async fn test_scripted_outcomes() {
        let (validator, handle) = MockValidator::new();
        handle.accept("A1");
        handle.time_out("B2", Duration::from_secs(5));

        assert!(validator.validate(&code("A1")).await.is_valid());
        assert_eq!(
            validator.validate(&code("B2")).await,
            ValidationOutcome::Error(ValidationFailure::Timeout { ms: 5000 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_and_in_flight_tracking() {
        let (validator, handle) = MockValidator::new();
        handle.set_latency(Duration::from_millis(300));

        let start = tokio::time::Instant::now();
        validator.validate(&code("A1")).await;
        validator.validate(&code("A2")).await;

        assert_eq!(start.elapsed(), Duration::from_millis(600));
        assert_eq!(handle.max_in_flight(), 1);
    }
}
