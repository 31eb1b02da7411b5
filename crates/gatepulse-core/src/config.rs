//! Agent configuration.
//!
//! The configuration is read once at startup from a JSON file, corrected
//! where values are out of range, overridden from the environment, and then
//! handed to each component by value. Nothing in the agent mutates it after
//! that point.
//!
//! When the file does not exist a template is written in its place and the
//! caller is told to stop, so the operator can fill in the credential before
//! the agent runs for real.

use crate::constants::{
    API_KEY_PLACEHOLDER, DEFAULT_ENDPOINT, DEFAULT_GPIO_ROOT, DEFAULT_LOG_LEVEL,
    DEFAULT_PULSE_SECS, DEFAULT_QUEUE_CAPACITY, DEFAULT_RELAY_PIN, DEFAULT_TIMEOUT_SECS,
    ENV_API_KEY, ENV_ENDPOINT, ENV_LOG_LEVEL, MAX_PULSE_SECS, MAX_TIMEOUT_SECS,
};
use crate::{AccessDirection, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolved agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Validation endpoint URL.
    pub endpoint: String,

    /// Credential sent verbatim in the `Authorization` header.
    pub api_key: String,

    /// Request timeout in seconds.
    pub timeout_secs: f64,

    /// GPIO line driving the relay. A global sysfs number, or an offset on
    /// `gpio_chip` when that is set.
    pub relay_pin: u32,

    /// Label of the GPIO controller `relay_pin` is counted on
    /// (`pinctrl-rp1` on a Raspberry Pi 5).
    pub gpio_chip: Option<String>,

    /// Time the relay stays active per pulse, in seconds.
    pub pulse_secs: f64,

    /// Drive the line low to energize the relay.
    pub active_low: bool,

    /// Direction of passage reported to the validation service.
    pub direction: AccessDirection,

    /// Root of the sysfs GPIO interface.
    pub gpio_root: PathBuf,

    /// Code prefixes accepted for validation. Empty accepts every code.
    pub permitted_prefixes: Vec<String>,

    /// Pulses that may wait behind the active one.
    pub queue_capacity: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: API_KEY_PLACEHOLDER.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            relay_pin: DEFAULT_RELAY_PIN,
            gpio_chip: None,
            pulse_secs: DEFAULT_PULSE_SECS,
            active_low: false,
            direction: AccessDirection::In,
            gpio_root: PathBuf::from(DEFAULT_GPIO_ROOT),
            permitted_prefixes: Vec::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Result of [`AgentConfig::load`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigLoad {
    /// The file existed and was parsed.
    Loaded(AgentConfig),

    /// The file was missing; a template was written at the given path.
    TemplateCreated(PathBuf),
}

impl AgentConfig {
    /// Load the configuration from `path`, creating a template if the file
    /// does not exist.
    ///
    /// Environment overrides are applied after the file is read.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON, or
    /// if the template cannot be written.
    pub fn load(path: &Path) -> Result<ConfigLoad> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an explicit environment lookup.
    pub fn load_with<F>(path: &Path, env: F) -> Result<ConfigLoad>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, creating template");
            Self::default().save(path)?;
            return Ok(ConfigLoad::TemplateCreated(path.to_path_buf()));
        }

        let mut config = Self::load_from_file(path)?;
        config.apply_overrides(env);

        if config.is_credential_configured() {
            info!(path = %path.display(), "Configuration loaded");
        } else {
            warn!(path = %path.display(), "No API key configured");
        }

        Ok(ConfigLoad::Loaded(config))
    }

    /// Parse a configuration file and correct out-of-range values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AgentConfig = serde_json::from_str(&content)?;
        config.sanitize();
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides for the credential, endpoint and log level.
    pub fn apply_overrides<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = env(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            debug!("API key overridden from environment");
            self.api_key = api_key.trim().to_string();
        }
        if let Some(endpoint) = env(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            debug!(endpoint = %endpoint, "Endpoint overridden from environment");
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(level) = env(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.log_level = level.trim().to_string();
        }
    }

    /// Replace out-of-range values with defaults.
    ///
    /// Non-positive durations and a zero pin fall back to their defaults;
    /// oversized durations are clamped.
    pub fn sanitize(&mut self) {
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = self.endpoint.trim().to_string();
        if self.endpoint.is_empty() {
            warn!("Empty endpoint in config, using default");
            self.endpoint = DEFAULT_ENDPOINT.to_string();
        }

        self.timeout_secs = sanitize_secs(
            "timeout_secs",
            self.timeout_secs,
            DEFAULT_TIMEOUT_SECS,
            MAX_TIMEOUT_SECS,
        );
        self.pulse_secs =
            sanitize_secs("pulse_secs", self.pulse_secs, DEFAULT_PULSE_SECS, MAX_PULSE_SECS);

        if self.relay_pin == 0 {
            warn!("relay_pin must be positive, using default {DEFAULT_RELAY_PIN}");
            self.relay_pin = DEFAULT_RELAY_PIN;
        }
        if self.queue_capacity == 0 {
            warn!("queue_capacity must be positive, using default {DEFAULT_QUEUE_CAPACITY}");
            self.queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        self.permitted_prefixes.retain(|p| !p.is_empty());
        self.gpio_chip = self
            .gpio_chip
            .take()
            .map(|chip| chip.trim().to_string())
            .filter(|chip| !chip.is_empty());
    }

    /// Returns `true` if a real credential is set.
    #[must_use]
    pub fn is_credential_configured(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != API_KEY_PLACEHOLDER
    }

    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }

    /// Relay pulse duration.
    #[must_use]
    pub fn pulse_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.pulse_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_PULSE_SECS))
    }
}

fn sanitize_secs(field: &str, value: f64, default: f64, max: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        warn!(field, value, default, "Non-positive duration in config, using default");
        default
    } else if value > max {
        warn!(field, value, max, "Duration too long in config, clamping");
        max
    } else {
        value
    }
}
