//! HTTP client for the code validation service.
//!
//! One validation is one POST: no retries, no connection state the caller
//! has to manage, and a hard upper bound on how long it may take.
//!
//! ```text
//! InputPipeline
//!     │ validate(code)
//!     ▼
//! ValidationClient ──POST {"guid": "<code>:0", "allowReentry": true}──► service
//!     │                 Authorization: <credential>
//!     ▼
//! ValidationOutcome::{Valid, Invalid, Error}
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gatepulse_core::Code;
//! use gatepulse_network::{ValidationClient, ValidationClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ValidationClientConfig {
//!     endpoint: "https://validation.example/v2/turnstiles/doConsume".into(),
//!     credential: "secret".into(),
//!     timeout: Duration::from_secs(5),
//!     ..Default::default()
//! };
//!
//! let client = ValidationClient::new(config)?;
//! let outcome = client.validate(&Code::new("ABC123")?).await;
//! println!("valid: {}", outcome.is_valid());
//! # Ok(())
//! # }
//! ```

use crate::error::ValidationFailure;
use crate::response::{ValidationOutcome, ValidationResponse, rejection_message};
use crate::validator::CodeValidator;
use gatepulse_core::constants::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};
use gatepulse_core::{AccessDirection, AgentConfig, Code, ValidationRequest};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for [`ValidationClient`].
#[derive(Debug, Clone)]
pub struct ValidationClientConfig {
    /// Full URL of the validation operation.
    pub endpoint: String,

    /// Value sent verbatim in the `Authorization` header.
    pub credential: String,

    /// Upper bound on a whole request/response exchange.
    pub timeout: Duration,

    /// Direction digit appended to every code.
    pub direction: AccessDirection,
}

impl Default for ValidationClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credential: String::new(),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            direction: AccessDirection::default(),
        }
    }
}

impl From<&AgentConfig> for ValidationClientConfig {
    fn from(config: &AgentConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            credential: config.api_key.trim().to_string(),
            timeout: config.timeout(),
            direction: config.direction,
        }
    }
}

/// Client for the code validation service.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ValidationClient {
    http: reqwest::Client,
    endpoint: String,
    credential: String,
    timeout: Duration,
    direction: AccessDirection,
}

impl ValidationClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationFailure::Config`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: ValidationClientConfig) -> Result<Self, ValidationFailure> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ValidationFailure::Config(e.to_string()))?;

        if config.credential.is_empty() {
            warn!("Validation client has no credential, requests will likely be rejected");
        }

        info!(
            endpoint = %config.endpoint,
            timeout_ms = config.timeout.as_millis() as u64,
            direction = %config.direction,
            "Validation client ready"
        );

        Ok(Self {
            http,
            endpoint: config.endpoint,
            credential: config.credential,
            timeout: config.timeout,
            direction: config.direction,
        })
    }

    /// Configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validate `code` with a single request.
    ///
    /// Never fails: transport problems are folded into
    /// [`ValidationOutcome::Error`].
    pub async fn validate(&self, code: &Code) -> ValidationOutcome {
        let request = ValidationRequest::new(code, self.direction);
        debug!(guid = %request.identifier, "Sending validation request");

        let outcome = match tokio::time::timeout(self.timeout, self.exchange(&request)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(failure)) => ValidationOutcome::Error(failure),
            Err(_) => ValidationOutcome::Error(self.timeout_failure()),
        };

        match &outcome {
            ValidationOutcome::Valid { .. } => debug!(%code, "Code accepted"),
            ValidationOutcome::Invalid { message } => debug!(%code, %message, "Code refused"),
            ValidationOutcome::Error(failure) => {
                warn!(%code, error = %failure, "Validation failed")
            }
        }
        outcome
    }

    async fn exchange(
        &self,
        request: &ValidationRequest,
    ) -> Result<ValidationOutcome, ValidationFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, self.credential.as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_failure(e))?;

        if !status.is_success() {
            return Err(ValidationFailure::Rejected {
                status: status.as_u16(),
                message: rejection_message(status.as_u16(), &body),
            });
        }

        Ok(ValidationResponse::parse(&body)?.classify())
    }

    fn transport_failure(&self, e: reqwest::Error) -> ValidationFailure {
        if e.is_timeout() {
            self.timeout_failure()
        } else if e.is_builder() {
            ValidationFailure::Config(e.to_string())
        } else {
            ValidationFailure::Network(e.to_string())
        }
    }

    fn timeout_failure(&self) -> ValidationFailure {
        ValidationFailure::Timeout {
            ms: self.timeout.as_millis() as u64,
        }
    }
}

impl CodeValidator for ValidationClient {
    async fn validate(&self, code: &Code) -> ValidationOutcome {
        ValidationClient::validate(self, code).await
    }
}
