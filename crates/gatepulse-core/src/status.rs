//! Status signals for the presentation layer.
//!
//! The agent core never prints. Every outcome it reaches (a code validated,
//! a pulse finished, the line released) is sent as a [`StatusSignal`] through
//! a [`StatusSink`]; whoever holds the receiving end decides how to render it.
//! A detached sink drops signals silently, which is what tests that only
//! care about relay behavior use.

use crate::Code;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// What asked for a relay pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseOrigin {
    /// A code that validated successfully.
    Validated,
    /// The `test` control token.
    Diagnostic,
}

impl fmt::Display for PulseOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validated => write!(f, "validated code"),
            Self::Diagnostic => write!(f, "relay test"),
        }
    }
}

/// Observable outcome emitted by the agent core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
#[non_exhaustive]
pub enum StatusSignal {
    /// The read loop is waiting for input.
    Ready,

    /// A validation request is being sent.
    ValidationStarted { code: String },

    /// The service accepted the code.
    CodeAccepted {
        code: String,
        detail: Option<String>,
    },

    /// The code was refused or could not be validated.
    CodeDenied { code: String, reason: String },

    /// The code did not match any permitted prefix and was not sent.
    CodeFiltered { code: String },

    /// A pulse was queued on the relay worker.
    PulseQueued { origin: PulseOrigin },

    /// A pulse was discarded because the queue was full or closing.
    PulseDropped { origin: PulseOrigin },

    /// A pulse finished and the relay is inactive again.
    PulseCompleted {
        origin: PulseOrigin,
        #[serde(with = "duration_millis")]
        active_for: Duration,
    },

    /// A pulse failed; a forced deactivation was attempted.
    PulseFailed { origin: PulseOrigin, error: String },

    /// The relay line was released at shutdown.
    CleanupPerformed,

    /// Releasing the relay line failed.
    CleanupFailed { error: String },
}

impl StatusSignal {
    /// Build a denial signal.
    pub fn denied(code: &Code, reason: impl Into<String>) -> Self {
        Self::CodeDenied {
            code: code.to_string(),
            reason: reason.into(),
        }
    }
}

/// A signal with the wall-clock time it was emitted.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub signal: StatusSignal,
}

/// Sending half of the status channel.
///
/// Cloning a sink is cheap; all clones feed the same receiver.
#[derive(Debug, Clone, Default)]
pub struct StatusSink {
    tx: Option<mpsc::UnboundedSender<StatusEvent>>,
}

impl StatusSink {
    /// Create a connected sink and its receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Create a sink that discards every signal.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Emit a signal. A closed or detached receiver is ignored.
    pub fn emit(&self, signal: StatusSignal) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(StatusEvent {
                timestamp: Utc::now(),
                signal,
            });
        }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
