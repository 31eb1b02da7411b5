//! Core types shared by every gatepulse crate.
//!
//! This crate holds the vocabulary of the access agent: operator codes,
//! relay states, the resolved [`AgentConfig`], the status signals emitted
//! for the presentation layer, and the common [`Error`] type.

pub mod config;
pub mod constants;
pub mod error;
pub mod status;
pub mod types;

pub use config::{AgentConfig, ConfigLoad};
pub use error::{Error, Result};
pub use status::{PulseOrigin, StatusEvent, StatusSignal, StatusSink};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
