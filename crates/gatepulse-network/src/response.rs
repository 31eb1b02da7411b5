//! Validation response parsing and classification.
//!
//! The service answers every request with a JSON object:
//!
//! ```json
//! {
//!   "error": { "code": 404, "message": "invalid_code" },
//!   "data":  { "result": "...", "guid": "...", "verboseResult": "..." }
//! }
//! ```
//!
//! Both members are optional. A code is accepted when `error` is absent or
//! null, or when `error.message` is exactly `"success"`. Any other `error`
//! value means the code was refused.

use crate::error::ValidationFailure;
use gatepulse_core::constants::SUCCESS_SENTINEL;
use serde::Deserialize;
use serde_json::Value;

/// Verdict for a single code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The service accepted the code.
    Valid {
        /// Human readable detail from the response, when present.
        detail: Option<String>,
    },

    /// The service refused the code.
    Invalid {
        /// Refusal message from the response.
        message: String,
    },

    /// No verdict could be obtained. Treated as a refusal.
    Error(ValidationFailure),
}

impl ValidationOutcome {
    /// Returns `true` only for [`ValidationOutcome::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Operator-facing reason for a refusal, `None` when valid.
    pub fn denial_reason(&self) -> Option<String> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { message } => Some(message.clone()),
            Self::Error(failure) => Some(failure.to_string()),
        }
    }
}

/// Body of a validation response.
///
/// Members are kept as raw JSON so unexpected shapes inside `error` or
/// `data` still classify instead of failing the whole parse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ValidationResponse {
    #[serde(default)]
    pub error: Option<Value>,

    #[serde(default)]
    pub data: Option<Value>,
}

impl ValidationResponse {
    /// Parse a 2xx response body.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailure::Malformed`] if the body is not valid JSON
    /// or its top level is not an object.
    pub fn parse(body: &str) -> Result<Self, ValidationFailure> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| ValidationFailure::Malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(ValidationFailure::Malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        serde_json::from_value(value).map_err(|e| ValidationFailure::Malformed(e.to_string()))
    }

    /// `error.message`, if the error is an object with a string message.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref()?.get("message")?.as_str()
    }

    /// `error.code`, rendered as text.
    pub fn error_code(&self) -> Option<String> {
        match self.error.as_ref()?.get("code")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// `data.verboseResult`, falling back to `data.result`.
    pub fn detail(&self) -> Option<String> {
        let data = self.data.as_ref()?;
        ["verboseResult", "result"]
            .iter()
            .find_map(|key| data.get(*key).and_then(Value::as_str))
            .map(str::to_owned)
    }

    /// Apply the acceptance rule.
    pub fn classify(&self) -> ValidationOutcome {
        let accepted = match &self.error {
            None | Some(Value::Null) => true,
            Some(_) => self.error_message() == Some(SUCCESS_SENTINEL),
        };

        if accepted {
            return ValidationOutcome::Valid {
                detail: self.detail(),
            };
        }

        let message = match (self.error_message(), self.error_code()) {
            (Some(message), _) => message.to_string(),
            (None, Some(code)) => format!("error code {code}"),
            (None, None) => self
                .error
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_default(),
        };
        ValidationOutcome::Invalid { message }
    }
}

/// Best-effort message from a non-2xx body.
pub(crate) fn rejection_message(status: u16, body: &str) -> Option<String> {
    let from_body = ValidationResponse::parse(body)
        .ok()
        .and_then(|r| r.error_message().map(str::to_owned));

    from_body.or_else(|| (status == 401).then(|| "unauthorized".to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
