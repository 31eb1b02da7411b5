//! Default values and fixed wire constants for the access agent.
//!
//! Defaults apply whenever the configuration file omits a value or supplies
//! one outside the accepted range. The wire constants describe the upstream
//! validation service and must not change without a matching server change.
//!
//! # Usage
//!
//! ```
//! use gatepulse_core::constants::*;
//! use std::time::Duration;
//!
//! let timeout = Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS);
//! assert_eq!(timeout, Duration::from_secs(5));
//! assert_eq!(SUCCESS_SENTINEL, "success");
//! ```

// ============================================================================
// Validation Service
// ============================================================================

/// Default validation endpoint (the upstream `doConsume` operation).
pub const DEFAULT_ENDPOINT: &str =
    "https://beta-backend-dev-kpe3ohblca-ew.a.run.app/v2/turnstiles/doConsume";

/// Placeholder credential written into generated configuration templates.
///
/// A credential equal to this value is treated as "not configured".
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 5.0;

/// Upper bound on the configured request timeout, in seconds.
pub const MAX_TIMEOUT_SECS: f64 = 300.0;

/// Message carried in the `error` object of a response that is nonetheless
/// a successful validation.
pub const SUCCESS_SENTINEL: &str = "success";

/// Separator between the code and the access-direction digit in the request
/// identifier (`<code>:0`).
pub const DIRECTION_SEPARATOR: char = ':';

/// Re-entry policy flag sent with every validation request.
pub const ALLOW_REENTRY: bool = true;

// ============================================================================
// Relay
// ============================================================================

/// Default GPIO line driving the relay (BCM numbering).
pub const DEFAULT_RELAY_PIN: u32 = 17;

/// Default time the relay stays active per pulse, in seconds.
pub const DEFAULT_PULSE_SECS: f64 = 0.2;

/// Upper bound on the configured pulse duration, in seconds.
///
/// Pulses longer than this are clamped so a bad configuration cannot hold a
/// turnstile open indefinitely.
pub const MAX_PULSE_SECS: f64 = 10.0;

/// Default root of the Linux sysfs GPIO interface.
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Default number of pulses that may wait behind the active one.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// Number of attempts made to drive the line inactive after a pulse before
/// falling back to a forced deactivation.
pub const DEACTIVATE_ATTEMPTS: u32 = 3;

// ============================================================================
// Agent
// ============================================================================

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "gatepulse.json";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable overriding the credential.
pub const ENV_API_KEY: &str = "GATEPULSE_API_KEY";

/// Environment variable overriding the endpoint.
pub const ENV_ENDPOINT: &str = "GATEPULSE_ENDPOINT";

/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "GATEPULSE_LOG_LEVEL";

/// Control tokens that end the read loop (compared case-insensitively).
pub const QUIT_TOKENS: [&str; 3] = ["quit", "exit", "q"];

/// Control token that pulses the relay without validation.
pub const TEST_TOKEN: &str = "test";
