//! reqwest-backed transport.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;

use crate::pipeline::Credential;
use crate::transport::{Transport, TransportError, TransportResponse};

/// Production transport sharing one connection pool across invocations.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("image-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (custom proxies, TLS roots, test settings).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        limit: Duration,
        max_bytes: usize,
    ) -> Result<TransportResponse, TransportError> {
        match timeout(limit, read_capped(request, limit, max_bytes)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(limit)),
        }
    }
}

// Reads chunk by chunk so an oversized body is dropped once it passes the cap.
async fn read_capped(
    request: reqwest::RequestBuilder,
    limit: Duration,
    max_bytes: usize,
) -> Result<TransportResponse, TransportError> {
    let mut response = request.send().await.map_err(|e| from_reqwest(e, limit))?;
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if response.content_length().is_some_and(|len| len > max_bytes as u64) {
        return Err(TransportError::TooLarge { limit: max_bytes });
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| from_reqwest(e, limit))? {
        if body.len() + chunk.len() > max_bytes {
            return Err(TransportError::TooLarge { limit: max_bytes });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(TransportResponse {
        status,
        content_type,
        body,
    })
}

fn from_reqwest(error: reqwest::Error, limit: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(limit)
    } else {
        TransportError::Network(error.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &Value,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<TransportResponse, TransportError> {
        let request = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", credential.expose()))
            .json(body);
        self.execute(request, timeout, max_bytes).await
    }

    async fn get(&self, url: &str, timeout: Duration, max_bytes: usize) -> Result<TransportResponse, TransportError> {
        self.execute(self.client.get(url), timeout, max_bytes).await
    }
}
