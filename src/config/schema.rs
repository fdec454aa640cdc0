//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the image relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, route, limits).
    pub listener: ListenerConfig,

    /// Upstream transformation service.
    pub upstream: UpstreamConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Upstream status classification.
    pub statuses: StatusPolicyConfig,

    /// Inbound image bounds.
    pub input: InputConfig,

    /// Result fetch settings.
    pub result: ResultConfig,

    /// Diagnostic payload handling.
    pub diagnostics: DiagnosticsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path the generate handler is mounted on.
    pub route_path: String,

    /// Maximum accepted request body in bytes.
    pub body_limit_bytes: usize,

    /// Overall budget for one invocation, in seconds.
    pub invocation_deadline_secs: u64,

    /// Value for `Access-Control-Allow-Origin` ("*" allows any origin).
    pub cors_allow_origin: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            route_path: "/api/generate".to_string(),
            body_limit_bytes: 10 * 1024 * 1024,
            invocation_deadline_secs: 60,
            cors_allow_origin: "*".to_string(),
        }
    }
}

impl ListenerConfig {
    pub fn invocation_deadline(&self) -> Duration {
        Duration::from_secs(self.invocation_deadline_secs)
    }
}

/// Upstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Endpoint receiving the `POST` with the candidate payload.
    pub endpoint: String,

    /// Environment variable holding the bearer credential.
    pub credential_env: String,

    /// Inline credential; takes precedence over `credential_env` when set.
    /// Intended for local runs and tests.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Per-attempt timeout in seconds.
    pub attempt_timeout_secs: u64,

    /// Largest upstream response body read, in bytes. Inline results
    /// arrive base64-encoded inside it.
    pub max_response_bytes: usize,

    /// Value of the `version` field in every payload.
    pub payload_version: String,

    /// Name of the input slot that receives the image.
    pub input_field: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://app.wordware.ai/api/released-app/a26f58c9-f5a6-4f3b-86f1-c5f934fc75b6/run"
                .to_string(),
            credential_env: "UPSTREAM_API_KEY".to_string(),
            api_key: None,
            attempt_timeout_secs: 45,
            max_response_bytes: 40 * 1024 * 1024,
            payload_version: "^1.0".to_string(),
            input_field: "photo".to_string(),
        }
    }
}

impl UpstreamConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// Backoff growth between retries of the same payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Linear,
    #[default]
    Exponential,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per payload shape (first try included).
    pub max_attempts: u32,

    /// Base delay for backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for backoff in milliseconds.
    pub max_delay_ms: u64,

    /// How the delay grows with the attempt number.
    pub strategy: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            strategy: BackoffStrategy::Exponential,
        }
    }
}

/// Maps upstream HTTP statuses to dispatcher decisions.
///
/// The defaults were observed against live deployments, not taken from a
/// documented contract, so they stay overridable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusPolicyConfig {
    /// Statuses meaning the payload shape itself was refused.
    pub shape_rejected: Vec<u16>,

    /// Statuses worth retrying with the same payload.
    pub transient: Vec<u16>,

    /// Treat every 5xx not listed above as transient.
    pub server_errors_transient: bool,
}

impl Default for StatusPolicyConfig {
    fn default() -> Self {
        Self {
            shape_rejected: vec![405, 415],
            transient: vec![408, 425, 429],
            server_errors_transient: true,
        }
    }
}

/// Inbound image bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    /// Maximum length of the base64 text (≈ 6.6 MB binary at the default).
    pub max_encoded_chars: usize,

    /// Mime type assumed when the submission carries no `data:` prefix.
    pub default_mime: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_encoded_chars: 9_000_000,
            default_mime: "image/jpeg".to_string(),
        }
    }
}

/// Result materialization settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResultConfig {
    /// Timeout for fetching the result URL, in seconds.
    pub fetch_timeout_secs: u64,

    /// Mime type used when neither upstream nor the fetch declares one.
    pub default_mime: String,

    /// Largest result body accepted from the fetch.
    pub max_bytes: usize,
}

impl Default for ResultConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 20,
            default_mime: "image/png".to_string(),
            max_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ResultConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Diagnostic payload handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Include the scrubbed upstream sample in error responses.
    pub expose_raw_sample: bool,

    /// Characters of upstream body kept in samples.
    pub max_sample_chars: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            expose_raw_sample: false,
            max_sample_chars: 2048,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub log_filter: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Address for the exporter's scrape endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "image_relay=debug,tower_http=debug".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.upstream.attempt_timeout(), Duration::from_secs(45));
        assert_eq!(config.result.fetch_timeout(), Duration::from_secs(20));
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.input.max_encoded_chars, 9_000_000);
        assert!(!config.diagnostics.expose_raw_sample);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [upstream]
            endpoint = "https://upstream.test/run"

            [retries]
            max_attempts = 2
            strategy = "linear"

            [statuses]
            shape_rejected = [405]
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.endpoint, "https://upstream.test/run");
        assert_eq!(config.upstream.input_field, "photo");
        assert_eq!(config.retries.max_attempts, 2);
        assert_eq!(config.retries.strategy, BackoffStrategy::Linear);
        assert_eq!(config.statuses.shape_rejected, vec![405]);
        assert!(config.statuses.server_errors_transient);
        assert_eq!(config.listener.route_path, "/api/generate");
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = RelayConfig::default();
        config.upstream.api_key = Some("sk-secret".to_string());
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
    }
}
