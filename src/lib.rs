//! Image relay library.
//!
//! Accepts a base64 image, forwards it to one image-transformation service
//! whose contract drifts between deployments, and returns the result as a
//! self-contained data URI.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod transport;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{FinalResponse, RelayError, RelayPipeline};
