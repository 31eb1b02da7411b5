use crate::{
    Result,
    constants::{ALLOW_REENTRY, DIRECTION_SEPARATOR},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Operator-entered access code.
///
/// The code is an opaque token: it is trimmed of surrounding whitespace but
/// otherwise passed to the validation service exactly as typed.
///
/// # Security
/// This type implements constant-time comparison, since codes grant physical
/// access and are compared in places an attacker may time.
#[derive(Clone, Eq, Serialize, Deserialize)]
pub struct Code(String);

impl Code {
    /// Create a new code from raw operator input.
    ///
    /// # Errors
    /// Returns `Error::InvalidCode` if the input is empty after trimming.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidCode("code is empty".to_string()));
        }
        Ok(Code(trimmed.to_string()))
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the code starts with any of the given prefixes.
    ///
    /// An empty prefix list matches every code.
    #[must_use]
    pub fn has_any_prefix<S: AsRef<str>>(&self, prefixes: &[S]) -> bool {
        prefixes.is_empty() || prefixes.iter().any(|p| self.0.starts_with(p.as_ref()))
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Code").field(&self.0).finish()
    }
}

impl std::str::FromStr for Code {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Code::new(s)
    }
}

impl PartialEq for Code {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for Code {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Direction of passage requested at this gate.
///
/// Encoded as the digit appended to the code in the request identifier:
/// `0` for entry, `1` for exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessDirection {
    #[default]
    In,
    Out,
}

impl AccessDirection {
    /// The digit appended to the code for this direction.
    #[inline]
    #[must_use]
    pub fn suffix_digit(self) -> char {
        match self {
            AccessDirection::In => '0',
            AccessDirection::Out => '1',
        }
    }
}

impl fmt::Display for AccessDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessDirection::In => write!(f, "in"),
            AccessDirection::Out => write!(f, "out"),
        }
    }
}

impl std::str::FromStr for AccessDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "0" => Ok(AccessDirection::In),
            "out" | "1" => Ok(AccessDirection::Out),
            other => Err(Error::InvalidDirection(other.to_string())),
        }
    }
}

/// Body of a validation request.
///
/// Built once per attempt from a [`Code`] and never mutated. The field names
/// match the upstream service exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRequest {
    /// Code followed by the direction suffix, e.g. `ABC123:0`.
    #[serde(rename = "guid")]
    pub identifier: String,

    /// Re-entry policy flag.
    #[serde(rename = "allowReentry")]
    pub allow_reentry: bool,
}

impl ValidationRequest {
    /// Build the request for `code` entering in `direction`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatepulse_core::{AccessDirection, Code, ValidationRequest};
    ///
    /// let code = Code::new("ABC123").unwrap();
    /// let request = ValidationRequest::new(&code, AccessDirection::In);
    /// assert_eq!(request.identifier, "ABC123:0");
    /// assert!(request.allow_reentry);
    /// ```
    #[must_use]
    pub fn new(code: &Code, direction: AccessDirection) -> Self {
        Self {
            identifier: format!(
                "{}{}{}",
                code.as_str(),
                DIRECTION_SEPARATOR,
                direction.suffix_digit()
            ),
            allow_reentry: ALLOW_REENTRY,
        }
    }
}

/// Logical state of the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    /// Relay de-energized; the gate is locked.
    #[default]
    Inactive,
    /// Relay energized; the gate is released.
    Active,
}

impl RelayState {
    /// Returns `true` if the relay is active.
    #[inline]
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, RelayState::Active)
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RelayState::Inactive => write!(f, "Inactive"),
            RelayState::Active => write!(f, "Active"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ABC123", "ABC123")]
    #[case("  PA_42  ", "PA_42")]
    #[case("\tcode with spaces\n", "code with spaces")]
    fn test_code_valid(#[case] input: &str, #[case] expected: &str) {
        let code = Code::new(input).unwrap();
        assert_eq!(code.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn test_code_invalid(#[case] input: &str) {
        assert!(matches!(Code::new(input), Err(Error::InvalidCode(_))));
    }

    #[test]
    fn test_code_keeps_case() {
        let code = Code::new("abcDEF").unwrap();
        assert_eq!(code.as_str(), "abcDEF");
        assert_ne!(code, Code::new("ABCDEF").unwrap());
    }

    #[test]
    fn test_code_prefix_filter() {
        let code = Code::new("PA_1234").unwrap();
        let empty: [&str; 0] = [];
        assert!(code.has_any_prefix(&empty));
        assert!(code.has_any_prefix(&["SU_", "PA_"]));
        assert!(!code.has_any_prefix(&["SU_", "CL_"]));
    }

    #[rstest]
    #[case("in", AccessDirection::In)]
    #[case("OUT", AccessDirection::Out)]
    #[case("0", AccessDirection::In)]
    #[case("1", AccessDirection::Out)]
    fn test_access_direction_parse(#[case] input: &str, #[case] expected: AccessDirection) {
        assert_eq!(input.parse::<AccessDirection>().unwrap(), expected);
    }

    #[test]
    fn test_access_direction_invalid() {
        assert!("sideways".parse::<AccessDirection>().is_err());
    }

    #[test]
    fn test_validation_request_identifier() {
        let code = Code::new(" ABC123 ").unwrap();
        assert_eq!(
            ValidationRequest::new(&code, AccessDirection::In).identifier,
            "ABC123:0"
        );
        assert_eq!(
            ValidationRequest::new(&code, AccessDirection::Out).identifier,
            "ABC123:1"
        );
    }

    #[test]
    fn test_validation_request_wire_format() {
        let code = Code::new("ABC123").unwrap();
        let request = ValidationRequest::new(&code, AccessDirection::In);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "guid": "ABC123:0", "allowReentry": true })
        );
    }

    #[test]
    fn test_relay_state_default_inactive() {
        assert_eq!(RelayState::default(), RelayState::Inactive);
        assert!(!RelayState::Inactive.is_active());
        assert!(RelayState::Active.is_active());
    }
}
