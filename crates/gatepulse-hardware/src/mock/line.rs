//! Mock output line implementation for testing and development.
//!
//! The mock records every level change with a Tokio timestamp, so tests
//! running on a paused clock can assert exact pulse timing, and it can be
//! told to fail a number of upcoming writes to exercise the relay's
//! recovery paths.

use crate::{
    HardwareError, Result,
    traits::OutputLine,
    types::{Level, LineInfo, Polarity},
};
use gatepulse_core::RelayState;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Instant;

/// A recorded level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelChange {
    /// Level the line was driven to.
    pub level: Level,

    /// When the change happened.
    pub at: Instant,

    /// Whether the change came through [`OutputLine::force_level`].
    pub forced: bool,
}

/// A period during which the relay was energized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveInterval {
    pub start: Instant,
    /// `None` while the relay is still active.
    pub end: Option<Instant>,
}

#[derive(Debug)]
struct MockLineState {
    level: Level,
    changes: Vec<LevelChange>,
    failing_writes: u32,
    fail_forced: bool,
    write_attempts: u32,
    release_count: u32,
    released: bool,
}

/// Mock output line for testing and development.
///
/// # Examples
///
/// ```
/// use gatepulse_hardware::mock::MockOutputLine;
/// use gatepulse_hardware::traits::OutputLine;
/// use gatepulse_hardware::types::Level;
///
/// #[tokio::main]
/// async fn main() -> gatepulse_hardware::Result<()> {
///     let (mut line, handle) = MockOutputLine::new();
///
///     line.set_level(Level::High).await?;
///     assert_eq!(handle.level(), Level::High);
///
///     handle.fail_next_writes(1);
///     assert!(line.set_level(Level::Low).await.is_err());
///     assert_eq!(handle.level(), Level::High);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockOutputLine {
    state: Arc<Mutex<MockLineState>>,
    name: String,
}

impl MockOutputLine {
    /// Create a new mock line with the default name, starting low.
    pub fn new() -> (Self, MockLineHandle) {
        Self::with_name("Mock Line")
    }

    /// Create a new mock line with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockLineHandle) {
        let state = Arc::new(Mutex::new(MockLineState {
            level: Level::Low,
            changes: Vec::new(),
            failing_writes: 0,
            fail_forced: false,
            write_attempts: 0,
            release_count: 0,
            released: false,
        }));

        let line = Self {
            state: Arc::clone(&state),
            name: name.into(),
        };

        (line, MockLineHandle { state })
    }

    fn lock(&self) -> MutexGuard<'_, MockLineState> {
        lock_state(&self.state)
    }
}

impl Default for MockOutputLine {
    fn default() -> Self {
        Self::new().0
    }
}

impl OutputLine for MockOutputLine {
    async fn set_level(&mut self, level: Level) -> Result<()> {
        let mut state = self.lock();
        state.write_attempts += 1;

        if state.released {
            return Err(HardwareError::released(&self.name));
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(HardwareError::write_failed(
                &self.name,
                "simulated write failure",
            ));
        }

        state.level = level;
        state.changes.push(LevelChange {
            level,
            at: Instant::now(),
            forced: false,
        });
        Ok(())
    }

    fn force_level(&mut self, level: Level) -> Result<()> {
        let mut state = self.lock();
        if state.fail_forced {
            return Err(HardwareError::write_failed(
                &self.name,
                "simulated forced write failure",
            ));
        }

        state.level = level;
        state.changes.push(LevelChange {
            level,
            at: Instant::now(),
            forced: true,
        });
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.release_count += 1;
        state.released = true;
        Ok(())
    }

    fn info(&self) -> LineInfo {
        LineInfo::new(self.name.clone(), "mock")
    }
}

/// Handle for inspecting and controlling a mock line.
///
/// This handle can be cloned and shared across tasks.
#[derive(Debug, Clone)]
pub struct MockLineHandle {
    state: Arc<Mutex<MockLineState>>,
}

impl MockLineHandle {
    /// Current level of the line.
    pub fn level(&self) -> Level {
        lock_state(&self.state).level
    }

    /// Every level change so far, oldest first.
    pub fn changes(&self) -> Vec<LevelChange> {
        lock_state(&self.state).changes.clone()
    }

    /// Make the next `count` calls to `set_level` fail.
    pub fn fail_next_writes(&self, count: u32) {
        lock_state(&self.state).failing_writes = count;
    }

    /// Make calls to `force_level` fail (or succeed again).
    pub fn fail_forced_writes(&self, fail: bool) {
        lock_state(&self.state).fail_forced = fail;
    }

    /// Number of `set_level` calls, successful or not.
    pub fn write_attempts(&self) -> u32 {
        lock_state(&self.state).write_attempts
    }

    /// Number of times the line was released.
    pub fn release_count(&self) -> u32 {
        lock_state(&self.state).release_count
    }

    /// Returns `true` once the line has been released.
    pub fn is_released(&self) -> bool {
        lock_state(&self.state).released
    }

    /// Relay state implied by the current level.
    pub fn relay_state(&self, polarity: Polarity) -> RelayState {
        polarity.state_for(self.level())
    }

    /// Periods during which the relay was energized under `polarity`.
    ///
    /// Repeated writes of the same level do not open a new interval.
    pub fn active_intervals(&self, polarity: Polarity) -> Vec<ActiveInterval> {
        let active_level = polarity.level_for(RelayState::Active);
        let mut intervals = Vec::new();
        let mut open: Option<Instant> = None;

        for change in lock_state(&self.state).changes.iter() {
            match (change.level == active_level, open) {
                (true, None) => open = Some(change.at),
                (false, Some(start)) => {
                    intervals.push(ActiveInterval {
                        start,
                        end: Some(change.at),
                    });
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(start) = open {
            intervals.push(ActiveInterval { start, end: None });
        }
        intervals
    }
}

fn lock_state(state: &Mutex<MockLineState>) -> MutexGuard<'_, MockLineState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
