//! Result materialization.
//!
//! Inline results are wrapped directly. URL results are fetched here, on
//! the server, so the caller never has to make a cross-origin request.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ResultConfig;
use crate::observability::metrics;
use crate::pipeline::data_uri;
use crate::pipeline::error::RelayError;
use crate::pipeline::normalizer::{NormalizedResult, ResultSource};
use crate::pipeline::FinalResponse;
use crate::transport::{Transport, TransportError};

#[derive(Clone)]
pub struct Materializer {
    transport: Arc<dyn Transport>,
    fetch_timeout: Duration,
    default_mime: String,
    max_bytes: usize,
}

impl Materializer {
    pub fn new(transport: Arc<dyn Transport>, config: &ResultConfig) -> Self {
        Self {
            transport,
            fetch_timeout: config.fetch_timeout(),
            default_mime: config.default_mime.clone(),
            max_bytes: config.max_bytes,
        }
    }

    /// Package a normalized result as a [`FinalResponse`].
    pub async fn materialize(&self, result: NormalizedResult) -> Result<FinalResponse, RelayError> {
        let declared = result.mime_type;
        match result.source {
            ResultSource::Inline(bytes) => {
                let mime = declared.as_deref().unwrap_or(&self.default_mime);
                tracing::debug!(bytes = bytes.len(), mime = %mime, "Wrapping inline result");
                Ok(FinalResponse {
                    result_url: None,
                    data_url: data_uri::encode(mime, &bytes),
                })
            }
            ResultSource::Url(url) => {
                let data_url = self.fetch(&url, declared.as_deref()).await?;
                Ok(FinalResponse {
                    result_url: Some(url),
                    data_url,
                })
            }
        }
    }

    async fn fetch(&self, url: &str, declared: Option<&str>) -> Result<String, RelayError> {
        tracing::debug!(url = %url, "Fetching result");

        let response = match self.transport.get(url, self.fetch_timeout, self.max_bytes).await {
            Ok(response) => response,
            Err(TransportError::Timeout(after)) => {
                metrics::record_result_fetch("timeout");
                tracing::error!(url = %url, after = ?after, "Result fetch timed out");
                return Err(RelayError::ResultFetchTimeout(after));
            }
            Err(TransportError::TooLarge { limit }) => {
                metrics::record_result_fetch("too_large");
                tracing::error!(url = %url, limit, "Result exceeds size limit");
                return Err(RelayError::ResultFetchFailed {
                    status: None,
                    detail: format!("result is larger than {} bytes", limit),
                });
            }
            Err(e) => {
                metrics::record_result_fetch("error");
                tracing::error!(url = %url, error = %e, "Result fetch failed");
                return Err(RelayError::ResultFetchFailed {
                    status: None,
                    detail: e.to_string(),
                });
            }
        };

        if !response.is_success() {
            metrics::record_result_fetch("error");
            tracing::error!(url = %url, status = response.status, "Result fetch returned error status");
            return Err(RelayError::ResultFetchFailed {
                status: Some(response.status),
                detail: format!("result URL returned status {}", response.status),
            });
        }

        let mime = response
            .content_type
            .as_deref()
            .and_then(data_uri::media_type)
            .or(declared)
            .unwrap_or(&self.default_mime);

        metrics::record_result_fetch("success");
        tracing::debug!(bytes = response.body.len(), mime = %mime, "Result fetched");
        Ok(data_uri::encode(mime, &response.body))
    }
}
