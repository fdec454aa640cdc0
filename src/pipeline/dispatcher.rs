//! Upstream dispatch: payload-shape fallback and retries.
//!
//! # State Machine
//! ```text
//! TryingShape(i) ──(i == candidates)──▶ UpstreamExhausted
//!      │
//!      ▼
//! Attempt(i, n) ──▶ Success        → return body
//!               ──▶ Retry          → backoff, Attempt(i, n + 1)
//!               ──▶ NextShape      → TryingShape(i + 1)
//!               ──▶ Fail           → UpstreamPermanent
//! ```
//!
//! # Design Decisions
//! - Strictly sequential: one call in flight per invocation
//! - Shape rejection moves on without spending retries
//! - Transient failures and timeouts retry the same shape up to
//!   `max_attempts`, then fall through to the next shape
//! - The transition function is pure; only `dispatch` performs I/O

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::{RelayConfig, RetryConfig};
use crate::observability::metrics;
use crate::pipeline::credential::Credential;
use crate::pipeline::encoder::{PayloadCandidate, PayloadShape};
use crate::pipeline::error::RelayError;
use crate::pipeline::normalizer::UpstreamBody;
use crate::resilience::backoff::retry_delay;
use crate::resilience::{StatusClass, StatusPolicy};
use crate::transport::{Transport, TransportError};

/// Result of a single upstream call.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success { status: u16, body: Vec<u8> },
    ShapeRejected { status: u16, body: String },
    /// Transient status, or a network failure when `status` is `None`.
    TransientFailure { status: Option<u16>, detail: String },
    PermanentFailure { status: u16, body: String },
    Timeout { after: Duration },
}

/// Outcome category kept in the attempt log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    ShapeRejected,
    TransientFailure,
    PermanentFailure,
    Timeout,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::ShapeRejected => "shape_rejected",
            OutcomeKind::TransientFailure => "transient",
            OutcomeKind::PermanentFailure => "permanent",
            OutcomeKind::Timeout => "timeout",
        }
    }
}

impl AttemptOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            AttemptOutcome::Success { .. } => OutcomeKind::Success,
            AttemptOutcome::ShapeRejected { .. } => OutcomeKind::ShapeRejected,
            AttemptOutcome::TransientFailure { .. } => OutcomeKind::TransientFailure,
            AttemptOutcome::PermanentFailure { .. } => OutcomeKind::PermanentFailure,
            AttemptOutcome::Timeout { .. } => OutcomeKind::Timeout,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptOutcome::Success { status, .. }
            | AttemptOutcome::ShapeRejected { status, .. }
            | AttemptOutcome::PermanentFailure { status, .. } => Some(*status),
            AttemptOutcome::TransientFailure { status, .. } => *status,
            AttemptOutcome::Timeout { .. } => None,
        }
    }
}

/// One entry of the per-invocation attempt log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamAttempt {
    pub shape: PayloadShape,
    pub attempt_number: u32,
    pub outcome: OutcomeKind,
    pub status: Option<u16>,
}

/// Last failure seen, reported when the candidates run out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSummary {
    pub status: Option<u16>,
    pub detail: String,
}

/// Dispatcher position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    TryingShape(usize),
    Attempt { shape: usize, attempt: u32 },
}

/// What to do after an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Success(Vec<u8>),
    Retry(FailureSummary),
    NextShape(FailureSummary),
    Fail { status: u16, body: String },
}

/// Decide the next step from an attempt outcome.
///
/// `attempt` is 1-based; `max_attempts` counts the first try.
pub fn transition(outcome: AttemptOutcome, attempt: u32, max_attempts: u32) -> Transition {
    match outcome {
        AttemptOutcome::Success { body, .. } => Transition::Success(body),
        AttemptOutcome::ShapeRejected { status, body } => Transition::NextShape(FailureSummary {
            status: Some(status),
            detail: format!("payload shape rejected with status {}: {}", status, body),
        }),
        AttemptOutcome::PermanentFailure { status, body } => Transition::Fail { status, body },
        AttemptOutcome::TransientFailure { status, detail } => {
            let summary = FailureSummary {
                status,
                detail: match status {
                    Some(code) => format!("status {}: {}", code, detail),
                    None => detail,
                },
            };
            retry_or_move_on(summary, attempt, max_attempts)
        }
        AttemptOutcome::Timeout { after } => {
            let summary = FailureSummary {
                status: None,
                detail: format!("timed out after {:?}", after),
            };
            retry_or_move_on(summary, attempt, max_attempts)
        }
    }
}

fn retry_or_move_on(summary: FailureSummary, attempt: u32, max_attempts: u32) -> Transition {
    if attempt < max_attempts {
        Transition::Retry(summary)
    } else {
        Transition::NextShape(summary)
    }
}

/// Successful dispatch.
#[derive(Debug)]
pub struct Dispatched {
    pub shape: PayloadShape,
    pub body: UpstreamBody,
    pub attempts: Vec<UpstreamAttempt>,
}

/// Drives candidates against the upstream endpoint.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    endpoint: String,
    attempt_timeout: Duration,
    max_response_bytes: usize,
    retry: RetryConfig,
    policy: StatusPolicy,
}

/// Response cap used until [`Dispatcher::with_response_limit`] says otherwise.
pub const DEFAULT_RESPONSE_LIMIT: usize = 40 * 1024 * 1024;

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoint: impl Into<String>,
        attempt_timeout: Duration,
        retry: RetryConfig,
        policy: StatusPolicy,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            attempt_timeout,
            max_response_bytes: DEFAULT_RESPONSE_LIMIT,
            retry,
            policy,
        }
    }

    /// Cap on the upstream response body.
    pub fn with_response_limit(mut self, max_bytes: usize) -> Self {
        self.max_response_bytes = max_bytes;
        self
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &RelayConfig) -> Self {
        Self::new(
            transport,
            config.upstream.endpoint.clone(),
            config.upstream.attempt_timeout(),
            config.retries.clone(),
            StatusPolicy::from_config(&config.statuses),
        )
        .with_response_limit(config.upstream.max_response_bytes)
    }

    /// Run the state machine until a body is obtained or the candidates run out.
    pub async fn dispatch(
        &self,
        candidates: &[PayloadCandidate],
        credential: &Credential,
    ) -> Result<Dispatched, RelayError> {
        let mut attempts = Vec::new();
        let mut last_failure: Option<FailureSummary> = None;
        let mut state = DispatchState::TryingShape(0);

        loop {
            state = match state {
                DispatchState::TryingShape(index) if index >= candidates.len() => {
                    let last = last_failure.unwrap_or(FailureSummary {
                        status: None,
                        detail: "no payload candidates".to_string(),
                    });
                    tracing::error!(
                        attempts = attempts.len(),
                        last_status = ?last.status,
                        last_error = %last.detail,
                        "Upstream exhausted"
                    );
                    return Err(RelayError::UpstreamExhausted {
                        attempts: attempts.len(),
                        last_status: last.status,
                        last_error: last.detail,
                    });
                }
                DispatchState::TryingShape(index) => DispatchState::Attempt {
                    shape: index,
                    attempt: 1,
                },
                DispatchState::Attempt { shape, attempt } => {
                    let candidate = &candidates[shape];
                    let outcome = self.attempt(candidate, credential).await;
                    let kind = outcome.kind();
                    let status = outcome.status();

                    metrics::record_upstream_attempt(candidate.shape.name(), kind.as_str());
                    attempts.push(UpstreamAttempt {
                        shape: candidate.shape,
                        attempt_number: attempt,
                        outcome: kind,
                        status,
                    });

                    match transition(outcome, attempt, self.retry.max_attempts) {
                        Transition::Success(body) => {
                            tracing::info!(
                                shape = %candidate.shape,
                                attempt,
                                status = ?status,
                                total_attempts = attempts.len(),
                                "Upstream accepted payload"
                            );
                            return Ok(Dispatched {
                                shape: candidate.shape,
                                body: UpstreamBody::parse(&body),
                                attempts,
                            });
                        }
                        Transition::Retry(failure) => {
                            let delay = retry_delay(&self.retry, attempt);
                            tracing::warn!(
                                shape = %candidate.shape,
                                attempt,
                                outcome = kind.as_str(),
                                error = %failure.detail,
                                delay = ?delay,
                                "Retrying upstream call"
                            );
                            last_failure = Some(failure);
                            tokio::time::sleep(delay).await;
                            DispatchState::Attempt {
                                shape,
                                attempt: attempt + 1,
                            }
                        }
                        Transition::NextShape(failure) => {
                            tracing::warn!(
                                shape = %candidate.shape,
                                attempt,
                                outcome = kind.as_str(),
                                error = %failure.detail,
                                "Moving to next payload shape"
                            );
                            last_failure = Some(failure);
                            DispatchState::TryingShape(shape + 1)
                        }
                        Transition::Fail { status, body } => {
                            tracing::error!(
                                shape = %candidate.shape,
                                attempt,
                                status,
                                "Upstream rejected request permanently"
                            );
                            return Err(RelayError::UpstreamPermanent {
                                status,
                                detail: parse_detail(&body),
                            });
                        }
                    }
                }
            };
        }
    }

    async fn attempt(&self, candidate: &PayloadCandidate, credential: &Credential) -> AttemptOutcome {
        tracing::debug!(shape = %candidate.shape, endpoint = %self.endpoint, "Calling upstream");

        let response = match self
            .transport
            .post_json(
                &self.endpoint,
                credential,
                &candidate.body,
                self.attempt_timeout,
                self.max_response_bytes,
            )
            .await
        {
            Ok(response) => response,
            Err(TransportError::Timeout(after)) => return AttemptOutcome::Timeout { after },
            Err(e) => {
                return AttemptOutcome::TransientFailure {
                    status: None,
                    detail: e.to_string(),
                }
            }
        };

        let status = response.status;
        match self.policy.classify(status) {
            StatusClass::Success => AttemptOutcome::Success {
                status,
                body: response.body,
            },
            StatusClass::ShapeRejected => AttemptOutcome::ShapeRejected {
                status,
                body: response.text(),
            },
            StatusClass::Transient => AttemptOutcome::TransientFailure {
                status: Some(status),
                detail: response.text(),
            },
            StatusClass::Permanent => AttemptOutcome::PermanentFailure {
                status,
                body: response.text(),
            },
        }
    }
}

// Upstream error bodies are usually JSON; keep them structured when they are.
fn parse_detail(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
