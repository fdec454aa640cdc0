//! Error taxonomy surfaced at the relay boundary.
//!
//! Transient upstream failures and shape rejections never appear here on
//! their own: the dispatcher absorbs them as attempt outcomes and only
//! reports them through [`RelayError::UpstreamExhausted`].

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that end an invocation.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The image field is absent or empty.
    #[error("No image provided")]
    MissingInput,

    /// The image field is not a usable base64 string.
    #[error("Invalid image: {0}")]
    InvalidInput(String),

    /// Deployment fault; never retried.
    #[error("Upstream credential missing: {0}")]
    ConfigurationMissing(String),

    /// Upstream refused the request for a reason retries cannot fix.
    #[error("Upstream rejected the request with status {status}")]
    UpstreamPermanent { status: u16, detail: Value },

    /// Every candidate shape and retry was used up.
    #[error("Upstream unavailable after {attempts} attempts: {last_error}")]
    UpstreamExhausted {
        attempts: usize,
        last_status: Option<u16>,
        last_error: String,
    },

    /// No extraction rule matched the upstream body. The sample is already
    /// scrubbed and is `None` unless diagnostics exposure is enabled.
    #[error("No result found in upstream response")]
    UnrecognizedUpstreamShape { raw_sample: Option<String> },

    #[error("Result fetch timed out after {0:?}")]
    ResultFetchTimeout(Duration),

    #[error("Result fetch failed: {detail}")]
    ResultFetchFailed { status: Option<u16>, detail: String },

    /// The invocation's overall budget ran out; in-flight calls were dropped.
    #[error("Request exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

impl RelayError {
    /// Taxonomy name, reported as `kind` in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MissingInput => "MissingInput",
            RelayError::InvalidInput(_) => "InvalidInput",
            RelayError::ConfigurationMissing(_) => "ConfigurationMissing",
            RelayError::UpstreamPermanent { .. } => "UpstreamPermanent",
            RelayError::UpstreamExhausted { .. } => "UpstreamExhausted",
            RelayError::UnrecognizedUpstreamShape { .. } => "UnrecognizedUpstreamShape",
            RelayError::ResultFetchTimeout(_) => "ResultFetchTimeout",
            RelayError::ResultFetchFailed { .. } => "ResultFetchFailed",
            RelayError::DeadlineExceeded(_) => "DeadlineExceeded",
        }
    }

    /// HTTP status reported to the caller.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::MissingInput | RelayError::InvalidInput(_) => 400,
            RelayError::ConfigurationMissing(_) => 500,
            RelayError::UpstreamPermanent { status, .. } => *status,
            RelayError::UpstreamExhausted { .. } => 502,
            RelayError::UnrecognizedUpstreamShape { .. } => 500,
            RelayError::ResultFetchTimeout(_) | RelayError::ResultFetchFailed { .. } => 502,
            RelayError::DeadlineExceeded(_) => 504,
        }
    }

    /// Whether the caller caused the failure.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
