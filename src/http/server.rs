//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay and health handlers
//! - Wire up middleware (tracing, CORS, body limit, request ID)
//! - Answer bodies over the limit with the relay's own `InvalidInput` error
//! - Enforce the invocation deadline around the pipeline
//! - Serve until the shutdown signal, draining in-flight requests

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ListenerConfig, RelayConfig};
use crate::http::request::{self, X_REQUEST_ID};
use crate::observability::metrics;
use crate::pipeline::{RelayError, RelayPipeline};
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RelayPipeline>,
    pub config: Arc<RelayConfig>,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: Arc<RelayConfig>,
}

impl HttpServer {
    /// Create a server calling upstream through reqwest.
    pub fn new(config: RelayConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a server over any transport.
    pub fn with_transport(config: RelayConfig, transport: Arc<dyn Transport>) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            pipeline: Arc::new(RelayPipeline::new(config.clone(), transport)),
            config: config.clone(),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let request_id_header = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .route(&config.listener.route_path, post(generate_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.listener.body_limit_bytes))
            .layer(cors_layer(&config.listener))
            .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
    }

    /// The configured router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            route = %self.config.listener.route_path,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

fn cors_layer(listener: &ListenerConfig) -> CorsLayer {
    let origin = if listener.cors_allow_origin == "*" {
        AllowOrigin::any()
    } else {
        match HeaderValue::from_str(&listener.cors_allow_origin) {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::error!(origin = %listener.cors_allow_origin, "Invalid CORS origin, allowing none");
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Relay one image through the pipeline.
async fn generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = request::request_id(&headers);
    let deadline = state.config.listener.invocation_deadline();

    let fields = read_body(body, state.config.listener.body_limit_bytes).and_then(|body| {
        tracing::debug!(request_id = %request_id, body_bytes = body.len(), "Relay request received");
        request::parse_body(&body)
    });

    let outcome = match fields {
        // Dropping the pipeline future on expiry abandons any in-flight call.
        Ok(fields) => match tokio::time::timeout(deadline, state.pipeline.run(&fields)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::DeadlineExceeded(deadline)),
        },
        Err(e) => Err(e),
    };

    let response = match outcome {
        Ok(relayed) => {
            tracing::info!(
                request_id = %request_id,
                result_url = ?relayed.result_url,
                data_url_len = relayed.data_url.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Image relayed"
            );
            (StatusCode::OK, Json(relayed)).into_response()
        }
        Err(e) => {
            if e.is_client_error() {
                tracing::warn!(request_id = %request_id, kind = e.kind(), error = %e, "Relay request rejected");
            } else {
                tracing::error!(request_id = %request_id, kind = e.kind(), error = %e, "Relay request failed");
            }
            e.into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start);
    response
}

fn read_body(body: Result<Bytes, BytesRejection>, limit: usize) -> Result<Bytes, RelayError> {
    body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            RelayError::InvalidInput(format!("request body exceeds {} bytes", limit))
        } else {
            RelayError::InvalidInput(rejection.body_text())
        }
    })
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

async fn health_handler() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}
