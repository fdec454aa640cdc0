//! Inbound request handling.
//!
//! # Responsibilities
//! - Read the request ID assigned by the request-id layer
//! - Turn the raw body into JSON fields for the validator
//!
//! # Design Decisions
//! - The body is taken as bytes, not through `Json<T>`, so a missing or
//!   mistyped image field is reported by the validator in the relay's own
//!   error format
//! - An empty body counts as `{}` and ends up as `MissingInput`

use axum::http::HeaderMap;
use serde_json::Value;

use crate::pipeline::RelayError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID set by `SetRequestIdLayer`, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Parse the request body into raw JSON fields.
pub fn parse_body(body: &[u8]) -> Result<Value, RelayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(body)
        .map_err(|e| RelayError::InvalidInput(format!("request body is not valid JSON: {}", e)))
}
