//! Error responses.
//!
//! Maps [`RelayError`] to a status code and a JSON body:
//! `{"error", "kind", "status"?, "detail"?, "rawSample"?}`.
//! Upstream client errors keep upstream's status; upstream outages and
//! fetch failures become 502.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

use crate::pipeline::RelayError;

/// JSON body for a failed invocation.
pub fn error_body(error: &RelayError) -> Value {
    let mut body = Map::new();
    body.insert("error".into(), Value::String(error.to_string()));
    body.insert("kind".into(), Value::String(error.kind().to_string()));

    match error {
        RelayError::UpstreamPermanent { status, detail } => {
            body.insert("status".into(), Value::from(*status));
            body.insert("detail".into(), detail.clone());
        }
        RelayError::UpstreamExhausted { last_status, last_error, .. } => {
            if let Some(status) = last_status {
                body.insert("status".into(), Value::from(*status));
            }
            body.insert("detail".into(), Value::String(last_error.clone()));
        }
        RelayError::ResultFetchFailed { status, detail } => {
            if let Some(status) = status {
                body.insert("status".into(), Value::from(*status));
            }
            body.insert("detail".into(), Value::String(detail.clone()));
        }
        RelayError::UnrecognizedUpstreamShape { raw_sample } => {
            let sample = raw_sample.clone().map(Value::String).unwrap_or(Value::Null);
            body.insert("rawSample".into(), sample);
        }
        _ => {}
    }

    Value::Object(body)
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, Json(error_body(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_validation_body() {
        let body = error_body(&RelayError::MissingInput);
        assert_eq!(body, json!({"error": "No image provided", "kind": "MissingInput"}));
    }

    #[test]
    fn test_permanent_mirrors_upstream() {
        let error = RelayError::UpstreamPermanent {
            status: 422,
            detail: json!({"message": "face not found"}),
        };
        let body = error_body(&error);
        assert_eq!(body["status"], 422);
        assert_eq!(body["detail"]["message"], "face not found");
        assert_eq!(error.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_unrecognized_always_carries_sample_key() {
        let hidden = error_body(&RelayError::UnrecognizedUpstreamShape { raw_sample: None });
        assert!(hidden.get("rawSample").unwrap().is_null());

        let shown = error_body(&RelayError::UnrecognizedUpstreamShape {
            raw_sample: Some("{}".into()),
        });
        assert_eq!(shown["rawSample"], "{}");
    }

    #[test]
    fn test_status_codes() {
        let exhausted = RelayError::UpstreamExhausted {
            attempts: 6,
            last_status: None,
            last_error: "timed out".into(),
        };
        assert_eq!(exhausted.into_response().status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            RelayError::ResultFetchTimeout(Duration::from_secs(20)).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RelayError::ConfigurationMissing("UPSTREAM_API_KEY is not set".into())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::DeadlineExceeded(Duration::from_secs(60)).into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
