//! Enum wrapper for output line dispatch.
//!
//! Native `async fn` in traits (RPITIT) are not object-safe, so we cannot use
//! `Box<dyn OutputLine>`. [`AnyOutputLine`] provides concrete type dispatch
//! instead, and because each variant is a concrete type the compiler can see
//! that the returned futures are `Send`, which the relay worker needs.
//!
//! # Examples
//!
//! ```
//! use gatepulse_hardware::devices::AnyOutputLine;
//! use gatepulse_hardware::mock::MockOutputLine;
//!
//! let (line, _handle) = MockOutputLine::new();
//! let any_line = AnyOutputLine::Mock(line);
//! assert_eq!(any_line.name(), "Mock Line");
//! ```

use crate::mock::MockOutputLine;
#[cfg(feature = "hardware-sysfs")]
use crate::sysfs::SysfsOutputLine;
use crate::traits::OutputLine;
use crate::types::{Level, LineInfo};
use crate::Result;

/// Enum wrapper for output line dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyOutputLine {
    /// In-memory line for development and testing.
    Mock(MockOutputLine),

    /// Linux sysfs GPIO line.
    #[cfg(feature = "hardware-sysfs")]
    Sysfs(SysfsOutputLine),
}

impl AnyOutputLine {
    /// Short name of the line, used in log fields and error messages.
    pub fn name(&self) -> String {
        self.info().name
    }
}

impl OutputLine for AnyOutputLine {
    async fn set_level(&mut self, level: Level) -> Result<()> {
        match self {
            Self::Mock(line) => line.set_level(level).await,
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(line) => line.set_level(level).await,
        }
    }

    fn force_level(&mut self, level: Level) -> Result<()> {
        match self {
            Self::Mock(line) => line.force_level(level),
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(line) => line.force_level(level),
        }
    }

    async fn release(&mut self) -> Result<()> {
        match self {
            Self::Mock(line) => line.release().await,
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(line) => line.release().await,
        }
    }

    fn info(&self) -> LineInfo {
        match self {
            Self::Mock(line) => line.info(),
            #[cfg(feature = "hardware-sysfs")]
            Self::Sysfs(line) => line.info(),
        }
    }
}

impl From<MockOutputLine> for AnyOutputLine {
    fn from(line: MockOutputLine) -> Self {
        Self::Mock(line)
    }
}

#[cfg(feature = "hardware-sysfs")]
impl From<SysfsOutputLine> for AnyOutputLine {
    fn from(line: SysfsOutputLine) -> Self {
        Self::Sysfs(line)
    }
}
