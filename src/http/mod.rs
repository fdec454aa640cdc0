//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, deadline)
//!     → request.rs (request ID, body → JSON fields)
//!     → pipeline (validate, dispatch, normalize, materialize)
//!     → response.rs (RelayError → status + JSON body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
