//! Outbound HTTP transport.
//!
//! # Data Flow
//! ```text
//! dispatcher    → post_json(endpoint, credential, payload, attempt timeout, response cap)
//! materializer  → get(result url, fetch timeout, result cap)
//!     → http.rs (reqwest, production)
//!     → scripted.rs (in-memory, tests)
//! ```
//!
//! # Design Decisions
//! - Every call carries its own deadline; the whole exchange (headers and
//!   body) must finish inside it
//! - Timeouts are a distinct error, never folded into network failures
//! - Bodies are read against a byte cap and abandoned as soon as they pass it
//! - Non-2xx responses are not errors at this layer; classification belongs
//!   to the dispatcher and the materializer

pub mod http;
pub mod scripted;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::Credential;

pub use http::ReqwestTransport;
pub use scripted::{RecordedCall, ScriptedTransport};

/// A fully-read HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Errors raised before a complete response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The call did not complete within its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The body is larger than the caller accepts.
    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// Connection, TLS or protocol failure.
    #[error("network error: {0}")]
    Network(String),

    /// The HTTP client could not be constructed.
    #[error("client setup failed: {0}")]
    Client(String),
}

/// Minimal HTTP surface needed by the relay pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST` a JSON body with a bearer credential, reading at most
    /// `max_bytes` of the response.
    async fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &Value,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<TransportResponse, TransportError>;

    /// `GET` a URL, reading at most `max_bytes` of the body.
    async fn get(&self, url: &str, timeout: Duration, max_bytes: usize) -> Result<TransportResponse, TransportError>;
}
