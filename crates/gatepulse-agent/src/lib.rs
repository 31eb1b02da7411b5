//! Access agent: the read-validate-actuate loop.
//!
//! This crate ties the pieces together. Operator input comes from an
//! [`InputSource`], codes are checked by a
//! [`CodeValidator`](gatepulse_network::CodeValidator), and accepted codes
//! pulse the relay through a [`RelayHandle`](gatepulse_hardware::RelayHandle).
//!
//! # Example
//!
//! ```no_run
//! use gatepulse_agent::{InputPipeline, LineSource};
//! use gatepulse_core::{AgentConfig, StatusSink};
//! use gatepulse_hardware::mock::MockOutputLine;
//! use gatepulse_hardware::{AnyOutputLine, Polarity, RelayController, RelayWorker};
//! use gatepulse_network::{ValidationClient, ValidationClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::default();
//! let (line, _handle) = MockOutputLine::new();
//! let mut relay = RelayController::new(
//!     AnyOutputLine::Mock(line),
//!     Polarity::from_active_low(config.active_low),
//!     config.pulse_duration(),
//! );
//! relay.initialize().await?;
//!
//! let status = StatusSink::detached();
//! let relay = RelayWorker::new(relay, config.queue_capacity).spawn(status.clone());
//! let client = ValidationClient::new(ValidationClientConfig::from(&config))?;
//!
//! let report = InputPipeline::new(LineSource::stdin(), client, relay, status)
//!     .run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//! println!("stopped: {}", report.reason);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod filter;
pub mod input;
pub mod pipeline;
pub mod state_machine;

pub use error::{AgentError, Result};
pub use filter::CodeFilter;
pub use input::{InputCommand, InputSource, LineSource, MockInput, MockInputHandle};
pub use pipeline::{InputPipeline, PipelineCounts, PipelineReport, StopReason};
pub use state_machine::{PipelineState, StateMachine, StateTransition};
