//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream response status:
//!     → classify.rs (success / shape-rejected / transient / permanent)
//!     → On transient: backoff.rs (delay before retrying the same payload)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//!   (enforced by the transport)
//! - Jittered backoff prevents synchronized retries
//! - Attempt budget is per payload shape, never unbounded

pub mod backoff;
pub mod classify;

pub use classify::{StatusClass, StatusPolicy};
