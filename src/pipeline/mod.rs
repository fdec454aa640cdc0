//! Resilient upstream-call pipeline.
//!
//! # Data Flow
//! ```text
//! request JSON
//!     → validator.rs (ImageSubmission)
//!     → credential.rs (resolved once per invocation)
//!     → encoder.rs (ordered PayloadCandidates)
//!     → dispatcher.rs (shapes × retries → upstream body)
//!     → normalizer.rs (extraction rules → NormalizedResult)
//!     → materializer.rs (data URI, fetching the URL if needed)
//!     → FinalResponse
//! ```
//!
//! # Design Decisions
//! - Every invocation is independent; nothing here is shared mutably
//! - No network I/O happens before validation and credential resolution pass
//! - Upstream samples are scrubbed of the credential before they are logged

pub mod credential;
pub mod data_uri;
pub mod diagnostics;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod materializer;
pub mod normalizer;
pub mod validator;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::transport::Transport;

pub use credential::Credential;
pub use dispatcher::{Dispatcher, UpstreamAttempt};
pub use encoder::{PayloadCandidate, PayloadEncoder, PayloadShape};
pub use error::RelayError;
pub use materializer::Materializer;
pub use normalizer::{NormalizedResult, Normalizer};
pub use validator::ImageSubmission;

/// Success body returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResponse {
    /// Where upstream stored the result; informational only.
    pub result_url: Option<String>,
    /// The result as `data:<mime>;base64,<payload>`.
    pub data_url: String,
}

/// One configured pipeline, shared by all invocations.
#[derive(Clone)]
pub struct RelayPipeline {
    config: Arc<RelayConfig>,
    encoder: PayloadEncoder,
    dispatcher: Dispatcher,
    normalizer: Normalizer,
    materializer: Materializer,
}

impl RelayPipeline {
    pub fn new(config: Arc<RelayConfig>, transport: Arc<dyn Transport>) -> Self {
        Self {
            encoder: PayloadEncoder::from_config(&config.upstream),
            dispatcher: Dispatcher::from_config(transport.clone(), &config),
            normalizer: Normalizer::default(),
            materializer: Materializer::new(transport, &config.result),
            config,
        }
    }

    /// Replace the extraction rules.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Run one invocation against the raw request fields.
    pub async fn run(&self, request: &Value) -> Result<FinalResponse, RelayError> {
        let submission = validator::validate(request, &self.config.input)?;
        let credential = Credential::resolve(&self.config.upstream)?;

        tracing::debug!(
            size = submission.size_bytes(),
            mime = %submission.mime_type(),
            "Submission accepted"
        );

        let candidates = self.encoder.candidates(&submission);
        drop(submission);

        let dispatched = self.dispatcher.dispatch(&candidates, &credential).await?;
        drop(candidates);

        let normalized = self
            .normalizer
            .normalize(&dispatched.body)
            .map_err(|shape| self.unrecognized(&shape.raw, &credential))?;

        self.materializer.materialize(normalized).await
    }

    fn unrecognized(&self, raw: &str, credential: &Credential) -> RelayError {
        let diagnostics = &self.config.diagnostics;
        let sample = diagnostics::scrub_sample(raw, &[credential.expose()], diagnostics.max_sample_chars);
        tracing::error!(raw_sample = %sample, "No result found in upstream response");

        RelayError::UnrecognizedUpstreamShape {
            raw_sample: diagnostics.expose_raw_sample.then_some(sample),
        }
    }
}
