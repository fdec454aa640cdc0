//! Shared utilities for integration testing.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Response, Uri},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use image_relay::transport::ReqwestTransport;
use image_relay::{HttpServer, RelayConfig, Shutdown};

/// Credential every test relay is configured with.
pub const API_KEY: &str = "sk-integration";

/// A request observed by the mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub host: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    /// URL on the same mock, for results that point back at it.
    pub fn url_on_host(&self, path: &str) -> String {
        format!("http://{}{}", self.host, path)
    }
}

/// What the mock upstream answers with.
pub struct MockReply {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: Some("application/json"),
            body: body.to_string().into_bytes(),
        }
    }

    pub fn bytes(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: Some(content_type),
            body,
        }
    }
}

/// Handle to a running mock upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }
}

/// Start a programmable mock upstream on an ephemeral port.
///
/// The handler sees each request together with how many requests came
/// before it.
pub async fn start_mock_upstream<F>(handler: F) -> MockUpstream
where
    F: Fn(&RecordedRequest, usize) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = requests.clone();
    let app = Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
        let handler = handler.clone();
        let recorded = recorded.clone();
        async move {
            let request = RecordedRequest {
                method,
                path: uri.path().to_string(),
                host: headers
                    .get(header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string(),
                authorization: headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                body: body.to_vec(),
            };
            let index = {
                let mut recorded = recorded.lock().unwrap();
                recorded.push(request.clone());
                recorded.len() - 1
            };

            let reply = handler(&request, index);
            let mut response = Response::builder().status(reply.status);
            if let Some(content_type) = reply.content_type {
                response = response.header(header::CONTENT_TYPE, content_type);
            }
            response.body(Body::from(reply.body)).unwrap()
        }
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, requests }
}

/// An address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Relay config pointed at `endpoint` with fast retries.
pub fn relay_config(endpoint: String) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.endpoint = endpoint;
    config.upstream.api_key = Some(API_KEY.into());
    config.upstream.credential_env = "IMAGE_RELAY_TEST_UNSET_KEY".into();
    config.upstream.attempt_timeout_secs = 5;
    config.retries.base_delay_ms = 1;
    config.retries.max_delay_ms = 5;
    config.result.fetch_timeout_secs = 5;
    config
}

/// A relay serving on an ephemeral port. Dropping it stops the server.
pub struct RunningRelay {
    pub addr: SocketAddr,
    _shutdown: Shutdown,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a relay that talks to upstream over real sockets.
pub async fn start_relay(config: RelayConfig) -> RunningRelay {
    let transport = ReqwestTransport::with_client(client());
    let server = HttpServer::with_transport(config, Arc::new(transport));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningRelay { addr, _shutdown: shutdown }
}

/// Client that ignores proxy settings from the environment.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Base64 of a PNG-signed buffer of roughly `kib` KiB.
pub fn sample_image(kib: usize) -> String {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(kib * 1024, 0x42);
    STANDARD.encode(bytes)
}

/// Bytes the mock serves as a fetched result.
pub fn result_bytes() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4]
}
