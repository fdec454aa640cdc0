//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc with the HTTP layer and the pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the relay keeps no other state
//! - All fields have defaults to allow minimal configs
//! - The upstream credential is normally read from the environment variable
//!   named by `upstream.credential_env` at the start of every invocation; an
//!   inline `upstream.api_key` overrides it and is never serialized back out

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BackoffStrategy;
pub use schema::DiagnosticsConfig;
pub use schema::InputConfig;
pub use schema::ListenerConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::RelayConfig;
pub use schema::ResultConfig;
pub use schema::RetryConfig;
pub use schema::StatusPolicyConfig;
pub use schema::UpstreamConfig;
