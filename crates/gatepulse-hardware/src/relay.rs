//! Relay controller.
//!
//! [`RelayController`] owns the output line and is the only thing that
//! writes to it. A pulse is modelled as a scoped acquisition: activating the
//! relay yields an [`ActiveGuard`], and the relay goes back to inactive when
//! the guard is consumed by [`ActiveGuard::deactivate`] or, failing that,
//! when it is dropped.
//!
//! ```text
//! activate() ──► ActiveGuard ──sleep(pulse)──► deactivate()
//!                    │                          │ set_level × N attempts
//!                    │                          └─► force_level (sync)
//!                    └── dropped early (cancelled task) ──► force_level (sync)
//! ```
//!
//! # Examples
//!
//! ```
//! use gatepulse_hardware::devices::AnyOutputLine;
//! use gatepulse_hardware::mock::MockOutputLine;
//! use gatepulse_hardware::relay::RelayController;
//! use gatepulse_hardware::types::{Level, Polarity};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> gatepulse_hardware::Result<()> {
//!     let (line, handle) = MockOutputLine::new();
//!     let mut relay = RelayController::new(
//!         AnyOutputLine::Mock(line),
//!         Polarity::ActiveHigh,
//!         Duration::from_millis(10),
//!     );
//!
//!     relay.pulse().await?;
//!     assert_eq!(handle.level(), Level::Low);
//!
//!     relay.release().await?;
//!     Ok(())
//! }
//! ```

use crate::devices::AnyOutputLine;
use crate::traits::OutputLine;
use crate::types::Polarity;
use crate::{HardwareError, Result};
use gatepulse_core::RelayState;
use gatepulse_core::constants::DEACTIVATE_ATTEMPTS;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of a completed pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseReport {
    /// How long the relay was energized.
    pub active_for: Duration,

    /// `set_level` calls needed to deactivate (0 if the forced path was used).
    pub deactivation_attempts: u32,

    /// Whether the relay was returned to inactive by a forced write.
    pub forced: bool,
}

/// Sole owner of the relay output line.
#[derive(Debug)]
pub struct RelayController {
    line: AnyOutputLine,
    polarity: Polarity,
    pulse_duration: Duration,
    state: RelayState,
    released: bool,
}

impl RelayController {
    /// Create a controller for `line`.
    ///
    /// The line is assumed to start inactive; call
    /// [`initialize`](Self::initialize) to drive it there explicitly.
    pub fn new(line: AnyOutputLine, polarity: Polarity, pulse_duration: Duration) -> Self {
        Self {
            line,
            polarity,
            pulse_duration,
            state: RelayState::Inactive,
            released: false,
        }
    }

    /// Drive the line to inactive.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn initialize(&mut self) -> Result<()> {
        let level = self.polarity.level_for(RelayState::Inactive);
        self.line.set_level(level).await?;
        self.state = RelayState::Inactive;
        info!(line = %self.line.name(), %level, "Relay initialized inactive");
        Ok(())
    }

    /// Last state the controller successfully wrote.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Configured pulse duration.
    pub fn pulse_duration(&self) -> Duration {
        self.pulse_duration
    }

    /// Returns `true` once [`release`](Self::release) has been called.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Energize the relay and return the guard that will de-energize it.
    ///
    /// # Errors
    ///
    /// Returns an error if the line was released or the write fails. On a
    /// failed write a forced deactivation is attempted before returning.
    pub async fn activate(&mut self) -> Result<ActiveGuard<'_>> {
        if self.released {
            return Err(HardwareError::released(self.line.name()));
        }

        let level = self.polarity.level_for(RelayState::Active);
        if let Err(e) = self.line.set_level(level).await {
            error!(line = %self.line.name(), error = %e, "Failed to activate relay");
            // The write may have partially landed
            if let Err(force_err) = self.force_inactive() {
                error!(error = %force_err, "Forced deactivation after failed activation also failed");
            }
            return Err(e);
        }

        self.state = RelayState::Active;
        debug!(line = %self.line.name(), "Relay active");

        Ok(ActiveGuard {
            controller: self,
            activated_at: Instant::now(),
            armed: true,
        })
    }

    /// Energize the relay for the configured pulse duration.
    ///
    /// The relay is inactive again when this returns, whether it returns
    /// `Ok` or `Err`, unless the error is [`HardwareError::StuckActive`].
    ///
    /// # Errors
    ///
    /// Returns an error if activation fails, or if every deactivation
    /// attempt including the forced one fails.
    pub async fn pulse(&mut self) -> Result<PulseReport> {
        let duration = self.pulse_duration;
        let guard = self.activate().await?;
        tokio::time::sleep(duration).await;
        guard.deactivate().await
    }

    /// Drive the line inactive with a single synchronous write.
    fn force_inactive(&mut self) -> Result<()> {
        let level = self.polarity.level_for(RelayState::Inactive);
        self.line.force_level(level)?;
        self.state = RelayState::Inactive;
        Ok(())
    }

    /// Drive the relay inactive and give up the line.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the first error met while deactivating or releasing. The
    /// release itself is attempted even if deactivation failed.
    pub async fn release(&mut self) -> Result<()> {
        if self.released {
            debug!("Relay already released");
            return Ok(());
        }
        self.released = true;

        let level = self.polarity.level_for(RelayState::Inactive);
        let deactivated = match self.line.set_level(level).await {
            Ok(()) => {
                self.state = RelayState::Inactive;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Deactivation before release failed, forcing");
                self.force_inactive()
            }
        };

        let released = self.line.release().await;
        info!(line = %self.line.name(), "Relay line released");

        deactivated.and(released)
    }
}

/// Proof that the relay is energized.
///
/// Consuming the guard with [`deactivate`](Self::deactivate) is the normal
/// path. Dropping it without doing so (the owning task was cancelled, or a
/// panic unwound through it) forces the line inactive synchronously.
#[derive(Debug)]
#[must_use = "dropping the guard immediately de-energizes the relay"]
pub struct ActiveGuard<'a> {
    controller: &'a mut RelayController,
    activated_at: Instant,
    armed: bool,
}

impl ActiveGuard<'_> {
    /// Time since the relay was energized.
    pub fn elapsed(&self) -> Duration {
        self.activated_at.elapsed()
    }

    /// De-energize the relay.
    ///
    /// Tries `set_level` up to [`DEACTIVATE_ATTEMPTS`] times, then falls back
    /// to a forced write.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::StuckActive` if the forced write also fails.
    pub async fn deactivate(mut self) -> Result<PulseReport> {
        let level = self.controller.polarity.level_for(RelayState::Inactive);
        let mut last_error = None;

        for attempt in 1..=DEACTIVATE_ATTEMPTS {
            match self.controller.line.set_level(level).await {
                Ok(()) => {
                    self.armed = false;
                    self.controller.state = RelayState::Inactive;
                    let active_for = self.elapsed();
                    debug!(attempt, ?active_for, "Relay inactive");
                    return Ok(PulseReport {
                        active_for,
                        deactivation_attempts: attempt,
                        forced: false,
                    });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Relay deactivation attempt failed");
                    last_error = Some(e);
                }
            }
        }

        self.armed = false;
        let active_for = self.elapsed();
        match self.controller.force_inactive() {
            Ok(()) => {
                warn!(?active_for, "Relay deactivated by forced write");
                Ok(PulseReport {
                    active_for,
                    deactivation_attempts: 0,
                    forced: true,
                })
            }
            Err(force_err) => {
                let line = self.controller.line.name();
                error!(%line, error = %force_err, "Relay could not be deactivated");
                let message = match last_error {
                    Some(e) => format!("{e}; forced write: {force_err}"),
                    None => force_err.to_string(),
                };
                Err(HardwareError::stuck_active(line, message))
            }
        }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Relay guard dropped while active, forcing inactive");
        if let Err(e) = self.controller.force_inactive() {
            error!(error = %e, "Forced deactivation on drop failed");
        }
    }
}
