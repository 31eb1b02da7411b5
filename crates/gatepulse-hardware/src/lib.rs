//! Relay hardware layer for the gatepulse access agent.
//!
//! This crate drives the single digital output line that energizes the gate
//! relay. It is split into three layers:
//!
//! - [`OutputLine`] abstracts the physical line (a Linux sysfs GPIO pin or
//!   an in-memory mock) behind native `async fn` in traits.
//! - [`RelayController`] turns "pulse the relay" into an activate, hold,
//!   deactivate sequence whose deactivation is guaranteed by a scoped
//!   [`ActiveGuard`], even when the pulse is cancelled or a write fails.
//! - [`RelayWorker`] runs pulses on a background task so the caller never
//!   waits for the hold interval, and serializes them so two pulses never
//!   overlap.
//!
//! # Example
//!
//! ```no_run
//! use gatepulse_hardware::{AnyOutputLine, Polarity, RelayController};
//! use gatepulse_hardware::mock::MockOutputLine;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> gatepulse_hardware::Result<()> {
//!     let (line, handle) = MockOutputLine::new();
//!     let mut relay = RelayController::new(
//!         AnyOutputLine::Mock(line),
//!         Polarity::ActiveHigh,
//!         Duration::from_millis(200),
//!     );
//!
//!     relay.initialize().await?;
//!     let report = relay.pulse().await?;
//!     assert_eq!(report.active_for, Duration::from_millis(200));
//!
//!     relay.release().await?;
//!     relay.release().await?;
//!     assert_eq!(handle.release_count(), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] using [`HardwareError`].
//! A pulse that could not deactivate the relay reports
//! [`HardwareError::StuckActive`], which callers should treat as a fault
//! requiring attention.

pub mod devices;
pub mod error;
pub mod mock;
pub mod relay;
#[cfg(feature = "hardware-sysfs")]
pub mod sysfs;
pub mod traits;
pub mod types;
pub mod worker;

pub use devices::AnyOutputLine;
pub use error::{HardwareError, Result};
pub use relay::{ActiveGuard, PulseReport, RelayController};
#[cfg(feature = "hardware-sysfs")]
pub use sysfs::{SysfsOutputLine, resolve_chip_line};
pub use traits::OutputLine;
pub use types::{Level, LineInfo, Polarity};
pub use worker::{PendingPulses, PulseStats, RelayHandle, RelayWorker};
