//! Mock device implementations for testing and development.
//!
//! This module provides a simulated output line that can be inspected and
//! made to fail programmatically without requiring physical hardware.

pub mod line;

// Re-export commonly used types
pub use line::{ActiveInterval, LevelChange, MockLineHandle, MockOutputLine};
