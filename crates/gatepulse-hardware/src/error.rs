//! Error types for output line operations.
//!
//! Every failure here is an actuation or cleanup error: it is logged and
//! the relay is driven inactive on a best-effort basis, but none of these
//! errors stop the agent.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while driving the relay output line.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The line could not be claimed or configured.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Writing a level to the line failed.
    #[error("Write to line {line} failed: {message}")]
    WriteFailed { line: String, message: String },

    /// Every attempt to return the line to inactive failed, including the
    /// forced one. The relay may still be energized.
    #[error("Line {line} stuck active: {message}")]
    StuckActive { line: String, message: String },

    /// The line has already been released.
    #[error("Line {line} already released")]
    Released { line: String },

    /// Releasing the line at shutdown failed.
    #[error("Release of line {line} failed: {message}")]
    ReleaseFailed { line: String, message: String },
}

impl HardwareError {
    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new write failed error.
    pub fn write_failed(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            line: line.into(),
            message: message.into(),
        }
    }

    /// Create a new stuck-active error.
    pub fn stuck_active(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StuckActive {
            line: line.into(),
            message: message.into(),
        }
    }

    /// Create a new released error.
    pub fn released(line: impl Into<String>) -> Self {
        Self::Released { line: line.into() }
    }

    /// Create a new release failed error.
    pub fn release_failed(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReleaseFailed {
            line: line.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_failed_error() {
        let error = HardwareError::write_failed("gpio17", "EBUSY");
        assert!(matches!(error, HardwareError::WriteFailed { .. }));
        assert_eq!(error.to_string(), "Write to line gpio17 failed: EBUSY");
    }

    #[test]
    fn test_stuck_active_error() {
        let error = HardwareError::stuck_active("gpio17", "forced write failed");
        assert_eq!(
            error.to_string(),
            "Line gpio17 stuck active: forced write failed"
        );
    }

    #[test]
    fn test_released_error() {
        let error = HardwareError::released("mock");
        assert_eq!(error.to_string(), "Line mock already released");
    }
}
