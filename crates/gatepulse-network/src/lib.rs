//! Code validation against the remote access service.
//!
//! This crate turns an operator-entered [`Code`](gatepulse_core::Code) into
//! a [`ValidationOutcome`] with one HTTP POST. It never retries and never
//! returns an error to the caller: network trouble, timeouts, rejections
//! and malformed bodies all become [`ValidationOutcome::Error`], which the
//! agent treats as a refusal.
//!
//! # Components
//!
//! - [`ValidationClient`]: reqwest-based client for the service
//! - [`CodeValidator`]: the seam the input pipeline depends on
//! - [`MockValidator`]: scripted validator for tests and bench runs
//!
//! # Example
//!
//! ```no_run
//! use gatepulse_core::{AgentConfig, Code};
//! use gatepulse_network::{ValidationClient, ValidationClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::default();
//! let client = ValidationClient::new(ValidationClientConfig::from(&config))?;
//!
//! let outcome = client.validate(&Code::new("ABC123")?).await;
//! if let Some(reason) = outcome.denial_reason() {
//!     println!("denied: {reason}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod response;
mod validator;

pub use client::{ValidationClient, ValidationClientConfig};
pub use error::ValidationFailure;
pub use response::{ValidationOutcome, ValidationResponse};
pub use validator::{CodeValidator, MockValidator, MockValidatorHandle};
