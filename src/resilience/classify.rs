//! Upstream status classification.
//!
//! # Responsibilities
//! - Decide what a given upstream HTTP status means for the dispatcher
//!
//! # Design Decisions
//! - Mapping comes from configuration; the defaults were inferred from
//!   observed upstream behavior and are not a documented contract
//! - Shape rejection is checked before transience so an explicit listing
//!   always wins over the blanket 5xx rule
//! - Anything unlisted outside 2xx is permanent

use std::collections::HashSet;

use crate::config::StatusPolicyConfig;

/// What an upstream status means for the current payload candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx: the body holds the result.
    Success,
    /// The payload structure was refused; try the next shape.
    ShapeRejected,
    /// Worth retrying the same payload after a backoff.
    Transient,
    /// Caller-side or contract problem; surface immediately.
    Permanent,
}

/// Lookup table built from [`StatusPolicyConfig`].
#[derive(Debug, Clone)]
pub struct StatusPolicy {
    shape_rejected: HashSet<u16>,
    transient: HashSet<u16>,
    server_errors_transient: bool,
}

impl StatusPolicy {
    pub fn from_config(config: &StatusPolicyConfig) -> Self {
        Self {
            shape_rejected: config.shape_rejected.iter().copied().collect(),
            transient: config.transient.iter().copied().collect(),
            server_errors_transient: config.server_errors_transient,
        }
    }

    pub fn classify(&self, status: u16) -> StatusClass {
        if (200..300).contains(&status) {
            StatusClass::Success
        } else if self.shape_rejected.contains(&status) {
            StatusClass::ShapeRejected
        } else if self.transient.contains(&status)
            || (self.server_errors_transient && (500..600).contains(&status))
        {
            StatusClass::Transient
        } else {
            StatusClass::Permanent
        }
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::from_config(&StatusPolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let policy = StatusPolicy::default();
        assert_eq!(policy.classify(200), StatusClass::Success);
        assert_eq!(policy.classify(201), StatusClass::Success);
        assert_eq!(policy.classify(405), StatusClass::ShapeRejected);
        assert_eq!(policy.classify(415), StatusClass::ShapeRejected);
        assert_eq!(policy.classify(429), StatusClass::Transient);
        assert_eq!(policy.classify(500), StatusClass::Transient);
        assert_eq!(policy.classify(503), StatusClass::Transient);
        assert_eq!(policy.classify(400), StatusClass::Permanent);
        assert_eq!(policy.classify(401), StatusClass::Permanent);
        assert_eq!(policy.classify(302), StatusClass::Permanent);
    }

    #[test]
    fn test_configured_mapping() {
        let policy = StatusPolicy::from_config(&StatusPolicyConfig {
            shape_rejected: vec![422, 501],
            transient: vec![409],
            server_errors_transient: false,
        });
        assert_eq!(policy.classify(405), StatusClass::Permanent);
        assert_eq!(policy.classify(422), StatusClass::ShapeRejected);
        assert_eq!(policy.classify(501), StatusClass::ShapeRejected);
        assert_eq!(policy.classify(409), StatusClass::Transient);
        assert_eq!(policy.classify(503), StatusClass::Permanent);
    }
}
