use gatepulse_hardware::HardwareError;
use thiserror::Error;

/// Errors that end or disturb the read loop.
///
/// Validation problems are not errors at this level: they arrive as
/// refusals from the validator.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The input source could not be read. Ends the session.
    #[error("Input error: {0}")]
    Input(#[source] std::io::Error),

    /// Releasing the relay at shutdown failed.
    #[error("Relay cleanup failed: {0}")]
    Cleanup(#[from] HardwareError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
