//! Output line trait definition.
//!
//! The relay is driven through a single binary output line. This module
//! defines the contract between the [`RelayController`](crate::relay::RelayController)
//! and the driver behind the line, so the controller can run against a real
//! GPIO pin or an in-memory mock without change.
//!
//! The trait uses native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{Level, LineInfo};

/// Binary output line abstraction.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. For dynamic dispatch use the enum wrapper in the
/// [`devices`](crate::devices) module, which also keeps the futures `Send`
/// so the relay worker can be spawned on the Tokio runtime:
///
/// ```no_run
/// use gatepulse_hardware::devices::AnyOutputLine;
/// use gatepulse_hardware::mock::MockOutputLine;
/// use gatepulse_hardware::traits::OutputLine;
/// use gatepulse_hardware::types::Level;
///
/// # async fn example() -> gatepulse_hardware::Result<()> {
/// let (line, _handle) = MockOutputLine::new();
/// let mut any_line = AnyOutputLine::Mock(line);
/// any_line.set_level(Level::High).await?;
/// # Ok(())
/// # }
/// ```
pub trait OutputLine: Send + Sync {
    /// Drive the line to `level`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The line has been released
    /// - The write to the underlying device fails
    async fn set_level(&mut self, level: Level) -> Result<()>;

    /// Drive the line to `level` without suspending.
    ///
    /// Used on paths that cannot await, such as a guard being dropped while
    /// the relay is active. Implementations should make this a single,
    /// direct write.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn force_level(&mut self, level: Level) -> Result<()>;

    /// Give up ownership of the line.
    ///
    /// Calling this more than once has no further effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to release the line.
    async fn release(&mut self) -> Result<()>;

    /// Get line information.
    fn info(&self) -> LineInfo;
}
