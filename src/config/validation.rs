//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//! - Check the upstream endpoint is an absolute http(s) URL
//! - Detect statuses claimed by more than one class
//! - Keep the request body limit above the image size bound
//! - Report the worst-case invocation time so callers can compare it with
//!   the deadline
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::pipeline::PayloadShape;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("listener.route_path '{0}' must start with '/'")]
    RoutePath(String),

    #[error("listener.cors_allow_origin '{0}' is not a valid header value")]
    CorsOrigin(String),

    #[error("upstream.endpoint '{0}' must be an absolute http(s) URL")]
    Endpoint(String),

    #[error("upstream.credential_env must not be empty")]
    CredentialEnv,

    #[error("listener.body_limit_bytes ({body}) must exceed input.max_encoded_chars ({input})")]
    BodyLimit { body: usize, input: usize },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    DelayRange { base: u64, max: u64 },

    #[error("status {0} is outside 100..=599")]
    StatusRange(u16),

    #[error("status {0} is a success status and cannot be classified as a failure")]
    SuccessStatus(u16),

    #[error("status {0} is listed as both shape-rejected and transient")]
    ConflictingStatus(u16),

    #[error("{field} '{value}' is not a mime type")]
    Mime { field: &'static str, value: String },
}

/// Check every semantic rule, collecting all violations.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if !config.listener.route_path.starts_with('/') {
        errors.push(ValidationError::RoutePath(config.listener.route_path.clone()));
    }
    if config.listener.body_limit_bytes <= config.input.max_encoded_chars {
        errors.push(ValidationError::BodyLimit {
            body: config.listener.body_limit_bytes,
            input: config.input.max_encoded_chars,
        });
    }
    if HeaderValue::from_str(&config.listener.cors_allow_origin).is_err() {
        errors.push(ValidationError::CorsOrigin(config.listener.cors_allow_origin.clone()));
    }

    match url::Url::parse(&config.upstream.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::Endpoint(config.upstream.endpoint.clone())),
    }
    if config.upstream.credential_env.trim().is_empty() {
        errors.push(ValidationError::CredentialEnv);
    }

    let positives: [(&'static str, u64); 8] = [
        ("listener.body_limit_bytes", config.listener.body_limit_bytes as u64),
        ("listener.invocation_deadline_secs", config.listener.invocation_deadline_secs),
        ("upstream.attempt_timeout_secs", config.upstream.attempt_timeout_secs),
        ("upstream.max_response_bytes", config.upstream.max_response_bytes as u64),
        ("retries.max_attempts", u64::from(config.retries.max_attempts)),
        ("input.max_encoded_chars", config.input.max_encoded_chars as u64),
        ("result.fetch_timeout_secs", config.result.fetch_timeout_secs),
        ("result.max_bytes", config.result.max_bytes as u64),
    ];
    for (field, value) in positives {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::DelayRange {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }

    let statuses = &config.statuses;
    for &status in statuses.shape_rejected.iter().chain(statuses.transient.iter()) {
        if !(100..=599).contains(&status) {
            errors.push(ValidationError::StatusRange(status));
        } else if (200..300).contains(&status) {
            errors.push(ValidationError::SuccessStatus(status));
        }
    }
    for status in &statuses.shape_rejected {
        if statuses.transient.contains(status) {
            errors.push(ValidationError::ConflictingStatus(*status));
        }
    }

    for (field, value) in [
        ("input.default_mime", &config.input.default_mime),
        ("result.default_mime", &config.result.default_mime),
    ] {
        if !looks_like_mime(value) {
            errors.push(ValidationError::Mime { field, value: value.clone() });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Longest an invocation can take when every attempt of every shape runs
/// to its timeout and the result fetch does too.
pub fn worst_case_invocation(config: &RelayConfig) -> Duration {
    let attempts = config.retries.max_attempts;
    let per_shape = config.upstream.attempt_timeout() * attempts
        + Duration::from_millis(config.retries.max_delay_ms) * attempts.saturating_sub(1);
    per_shape * PayloadShape::ALL.len() as u32 + config.result.fetch_timeout()
}

fn looks_like_mime(value: &str) -> bool {
    match value.split_once('/') {
        Some((kind, sub)) => !kind.is_empty() && !sub.is_empty() && !value.contains(char::is_whitespace),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&RelayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RelayConfig::default();
        config.upstream.endpoint = "ftp://upstream.test".into();
        config.retries.max_attempts = 0;
        config.statuses.transient.push(405);
        config.result.default_mime = "png".into();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::Endpoint("ftp://upstream.test".into())));
        assert!(errors.contains(&ValidationError::Zero("retries.max_attempts")));
        assert!(errors.contains(&ValidationError::ConflictingStatus(405)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::Mime { field: "result.default_mime", .. })));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_rejects_success_and_out_of_range_statuses() {
        let mut config = RelayConfig::default();
        config.statuses.shape_rejected = vec![204, 700];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::SuccessStatus(204), ValidationError::StatusRange(700)]
        );
    }

    #[test]
    fn test_body_limit_must_exceed_input_bound() {
        let mut config = RelayConfig::default();
        config.listener.body_limit_bytes = config.input.max_encoded_chars;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::BodyLimit {
                body: 9_000_000,
                input: 9_000_000,
            }]
        );
    }

    #[test]
    fn test_worst_case_invocation() {
        let config = RelayConfig::default();
        // 2 shapes × (3 × 45s + 2 × 4s) + 20s fetch
        assert_eq!(worst_case_invocation(&config), Duration::from_secs(306));
        assert!(worst_case_invocation(&config) > config.listener.invocation_deadline());

        let mut quick = RelayConfig::default();
        quick.upstream.attempt_timeout_secs = 5;
        quick.retries.max_attempts = 2;
        quick.retries.max_delay_ms = 1000;
        quick.result.fetch_timeout_secs = 10;
        assert_eq!(worst_case_invocation(&quick), Duration::from_secs(32));
    }
}
