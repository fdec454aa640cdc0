//! End-to-end relay scenarios driven in-process through the router.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use image_relay::transport::{ScriptedTransport, TransportError};
use image_relay::{HttpServer, RelayConfig};

mod common;

const ENDPOINT: &str = "https://upstream.test/v1/run";

fn config() -> RelayConfig {
    common::relay_config(ENDPOINT.to_string())
}

async fn relay(config: RelayConfig, transport: Arc<ScriptedTransport>, body: String) -> (StatusCode, Value) {
    let response = HttpServer::with_transport(config, transport)
        .router()
        .oneshot(
            Request::post("/api/generate")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn image_request(kib: usize) -> String {
    json!({ "image_base64": common::sample_image(kib) }).to_string()
}

#[tokio::test]
async fn test_url_result_is_fetched_and_inlined() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .post_json_reply(200, json!({"output_image_url": "https://x/y.png"}))
            .get_reply(200, Some("image/png"), common::result_bytes()),
    );

    let (status, body) = relay(config(), transport.clone(), image_request(300)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result_url"], "https://x/y.png");
    assert!(body["data_url"].as_str().unwrap().starts_with("data:image/png;base64,"));

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].method, "POST");
    assert_eq!(calls[0].url, ENDPOINT);
    assert_eq!(calls[0].bearer.as_deref(), Some(common::API_KEY));
    assert_eq!(calls[1].method, "GET");
    assert_eq!(calls[1].url, "https://x/y.png");
}

#[tokio::test]
async fn test_shape_fallback_with_inline_result() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .post_json_reply(405, json!({"error": "unsupported input type"}))
            .post_json_reply(200, json!({"image_base64": "R0lGODlh", "mime_type": "image/gif"})),
    );

    let (status, body) = relay(config(), transport.clone(), image_request(300)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result_url"], Value::Null);
    assert_eq!(body["data_url"], "data:image/gif;base64,R0lGODlh");

    let calls = transport.calls();
    assert_eq!(calls.len(), 2, "no fetch for inline results");
    assert!(calls.iter().all(|c| c.method == "POST"));
    let first = calls[0].body.as_ref().unwrap();
    let second = calls[1].body.as_ref().unwrap();
    assert_eq!(first["inputs"]["photo"]["type"], "image");
    assert_eq!(second["inputs"]["photo"]["type"], "file");
}

#[tokio::test]
async fn test_persistent_outage_exhausts_every_shape() {
    let transport = Arc::new(
        ScriptedTransport::new().post_always(Ok(image_relay::transport::scripted::json_response(
            503,
            &json!({"error": "overloaded"}),
        ))),
    );
    let config = config();
    let max_attempts = config.retries.max_attempts as usize;

    let (status, body) = relay(config, transport.clone(), image_request(4)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "UpstreamExhausted");
    assert_eq!(body["status"], 503);
    assert_eq!(transport.call_count(), max_attempts * 2);
}

#[tokio::test]
async fn test_missing_image_makes_no_calls() {
    let transport = Arc::new(ScriptedTransport::new());

    let (status, body) = relay(config(), transport.clone(), json!({"prompt": "anime"}).to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "MissingInput");
    assert_eq!(body["error"], "No image provided");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_empty_body_is_missing_input() {
    let transport = Arc::new(ScriptedTransport::new());

    let (status, body) = relay(config(), transport.clone(), String::new()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "MissingInput");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_invalid_input() {
    let transport = Arc::new(ScriptedTransport::new());

    let (status, body) = relay(config(), transport.clone(), "{not json".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidInput");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_oversized_image_is_rejected_before_dispatch() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut config = config();
    config.input.max_encoded_chars = 1024;

    let (status, body) = relay(config, transport.clone(), image_request(4)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidInput");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_image_over_body_limit_with_default_config() {
    let transport = Arc::new(ScriptedTransport::new());
    let body = json!({ "image_base64": "A".repeat(11_000_000) }).to_string();

    let (status, body) = relay(RelayConfig::default(), transport.clone(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidInput");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_image_over_char_bound_with_default_config() {
    let transport = Arc::new(ScriptedTransport::new());
    let body = json!({ "image_base64": "A".repeat(9_500_000) }).to_string();

    let (status, body) = relay(RelayConfig::default(), transport.clone(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidInput");
    assert!(body["error"].as_str().unwrap().contains("9000000"));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_missing_credential_is_a_server_fault() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut config = config();
    config.upstream.api_key = None;

    let (status, body) = relay(config, transport.clone(), image_request(4)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "ConfigurationMissing");
    assert!(!body["error"].as_str().unwrap().contains(common::API_KEY));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_upstream_client_error_is_mirrored() {
    let transport = Arc::new(
        ScriptedTransport::new().post_json_reply(422, json!({"message": "no face detected"})),
    );

    let (status, body) = relay(config(), transport.clone(), image_request(4)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "UpstreamPermanent");
    assert_eq!(body["detail"]["message"], "no face detected");
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .post_reply(Err(TransportError::Network("connection reset".into())))
            .post_json_reply(429, json!({"error": "slow down"}))
            .post_json_reply(200, json!({"output": {"image_base64": "R0lGODlh"}})),
    );

    let (status, body) = relay(config(), transport.clone(), image_request(4)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data_url"], "data:image/png;base64,R0lGODlh");
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_unpadded_inline_result_is_reencoded() {
    let transport = Arc::new(
        ScriptedTransport::new().post_json_reply(200, json!({"output_image_base64": "R0lG\nOA"})),
    );

    let (status, body) = relay(config(), transport, image_request(4)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data_url"], "data:image/png;base64,R0lGOA==");
}

#[tokio::test]
async fn test_streamed_upstream_body() {
    let stream = concat!(
        "{\"type\":\"chunk\",\"value\":{\"output\":{\"image_url\":\"https://x/draft.png\"}}}\n",
        "{\"type\":\"chunk\",\"value\":{\"outputs\":{\"photo\":{\"image_url\":\"https://x/final.png\"}}}}\n",
    );
    let transport = Arc::new(
        ScriptedTransport::new()
            .post_reply(Ok(image_relay::transport::TransportResponse {
                status: 200,
                content_type: Some("application/x-ndjson".into()),
                body: stream.as_bytes().to_vec(),
            }))
            .get_reply(200, Some("image/webp; charset=binary"), common::result_bytes()),
    );

    let (status, body) = relay(config(), transport.clone(), image_request(4)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result_url"], "https://x/final.png");
    assert!(body["data_url"].as_str().unwrap().starts_with("data:image/webp;base64,"));
}

#[tokio::test]
async fn test_unrecognized_response_hides_sample() {
    let transport = Arc::new(
        ScriptedTransport::new().post_json_reply(200, json!({"status": "queued", "token": common::API_KEY})),
    );

    let (status, body) = relay(config(), transport, image_request(4)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "UnrecognizedUpstreamShape");
    assert_eq!(body["rawSample"], Value::Null);
}

#[tokio::test]
async fn test_unrecognized_response_sample_is_scrubbed_when_exposed() {
    let transport = Arc::new(
        ScriptedTransport::new().post_json_reply(200, json!({"status": "queued", "token": common::API_KEY})),
    );
    let mut config = config();
    config.diagnostics.expose_raw_sample = true;

    let (_, body) = relay(config, transport, image_request(4)).await;

    let sample = body["rawSample"].as_str().unwrap();
    assert!(sample.contains("queued"));
    assert!(!sample.contains(common::API_KEY));
}

#[tokio::test]
async fn test_result_fetch_timeout() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .post_json_reply(200, json!({"output_image_url": "https://x/slow.png"}))
            .get_result(Err(TransportError::Timeout(std::time::Duration::from_secs(5)))),
    );

    let (status, body) = relay(config(), transport, image_request(4)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "ResultFetchTimeout");
}
