//! Validation failure types.
//!
//! A failure means no verdict could be obtained from the validation service.
//! Callers treat every failure as a denial; the variants exist so the reason
//! can be logged and shown to the operator.

use thiserror::Error;

/// Reasons a validation attempt produced no verdict.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// Connection, DNS, or TLS failure, or the connection dropped mid-exchange.
    #[error("Network error: {0}")]
    Network(String),

    /// No complete response within the configured timeout.
    #[error("Validation timed out after {ms}ms")]
    Timeout {
        /// Configured timeout in milliseconds.
        ms: u64,
    },

    /// The service answered with a non-2xx status.
    #[error("Validation service rejected the request: HTTP {status}{}", format_message(.message))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error message from the body, if one could be extracted.
        message: Option<String>,
    },

    /// A 2xx response whose body is not a JSON object.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The request could not be built (bad endpoint URL or credential).
    #[error("Configuration error: {0}")]
    Config(String),
}

fn format_message(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(" ({m})"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ValidationFailure::Timeout { ms: 5000 }.to_string(),
            "Validation timed out after 5000ms"
        );
        assert_eq!(
            ValidationFailure::Rejected {
                status: 401,
                message: Some("unauthorized".into())
            }
            .to_string(),
            "Validation service rejected the request: HTTP 401 (unauthorized)"
        );
        assert_eq!(
            ValidationFailure::Rejected {
                status: 404,
                message: None
            }
            .to_string(),
            "Validation service rejected the request: HTTP 404"
        );
    }
}
