//! Upstream bearer credential.

use std::fmt;

use crate::config::UpstreamConfig;
use crate::pipeline::error::RelayError;

/// Bearer token for the upstream service. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Resolve the credential for one invocation.
    ///
    /// An inline `api_key` wins; otherwise the environment variable named by
    /// `credential_env` is read. Blank values count as absent.
    pub fn resolve(config: &UpstreamConfig) -> Result<Self, RelayError> {
        if let Some(key) = config.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(Self::new(key));
        }

        match std::env::var(&config.credential_env) {
            Ok(value) if !value.trim().is_empty() => Ok(Self::new(value.trim())),
            _ => Err(RelayError::ConfigurationMissing(format!(
                "{} is not set",
                config.credential_env
            ))),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
