//! Electrical level and polarity types for output lines.

use gatepulse_core::RelayState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Electrical level of a digital output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Value written to a sysfs `value` file.
    pub fn as_value(self) -> &'static str {
        match self {
            Self::Low => "0",
            Self::High => "1",
        }
    }

    /// Value written to a sysfs `direction` file to configure the line as an
    /// output starting at this level.
    pub fn as_direction(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Which level energizes the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Driving the line high energizes the relay.
    #[default]
    ActiveHigh,
    /// Driving the line low energizes the relay.
    ActiveLow,
}

impl Polarity {
    /// Polarity for the `active_low` configuration flag.
    pub fn from_active_low(active_low: bool) -> Self {
        if active_low {
            Self::ActiveLow
        } else {
            Self::ActiveHigh
        }
    }

    /// Level that puts the relay in `state`.
    pub fn level_for(self, state: RelayState) -> Level {
        match (self, state) {
            (Self::ActiveHigh, RelayState::Active) | (Self::ActiveLow, RelayState::Inactive) => {
                Level::High
            }
            (Self::ActiveHigh, RelayState::Inactive) | (Self::ActiveLow, RelayState::Active) => {
                Level::Low
            }
        }
    }

    /// Relay state produced by `level`.
    pub fn state_for(self, level: Level) -> RelayState {
        if self.level_for(RelayState::Active) == level {
            RelayState::Active
        } else {
            RelayState::Inactive
        }
    }
}

/// Description of an output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInfo {
    /// Line name (e.g., "gpio17", "Mock Line").
    pub name: String,

    /// Driver backing the line.
    pub driver: String,
}

impl LineInfo {
    /// Create a new LineInfo.
    pub fn new(name: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: driver.into(),
        }
    }
}
