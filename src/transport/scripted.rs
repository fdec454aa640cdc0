//! In-memory transport that replays queued responses and records every call.
//!
//! Used by the test suites to drive the pipeline without sockets and to
//! assert how many network calls an invocation made.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::pipeline::Credential;
use crate::transport::{Transport, TransportError, TransportResponse};

type Reply = Result<TransportResponse, TransportError>;

/// One call observed by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
    pub timeout: Duration,
    pub max_bytes: usize,
}

#[derive(Default)]
struct Script {
    posts: VecDeque<Reply>,
    post_fallback: Option<Reply>,
    gets: VecDeque<Reply>,
    calls: Vec<RecordedCall>,
}

/// Queue-driven [`Transport`].
///
/// Replies are consumed in order per method. An empty queue falls back to
/// the `*_always` reply when one is set, else to a network error.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON reply for the next `POST`.
    pub fn post_json_reply(self, status: u16, body: Value) -> Self {
        self.post_reply(Ok(json_response(status, &body)))
    }

    /// Queue a raw reply (or error) for the next `POST`.
    pub fn post_reply(self, reply: Reply) -> Self {
        self.lock().posts.push_back(reply);
        self
    }

    /// Reply used for every `POST` once the queue is drained.
    pub fn post_always(self, reply: Reply) -> Self {
        self.lock().post_fallback = Some(reply);
        self
    }

    /// Queue a binary reply for the next `GET`.
    pub fn get_reply(self, status: u16, content_type: Option<&str>, body: Vec<u8>) -> Self {
        self.get_result(Ok(TransportResponse {
            status,
            content_type: content_type.map(str::to_string),
            body,
        }))
    }

    /// Queue a raw reply (or error) for the next `GET`.
    pub fn get_result(self, reply: Reply) -> Self {
        self.lock().gets.push_back(reply);
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("scripted transport mutex poisoned")
    }
}

/// Build a JSON [`TransportResponse`].
pub fn json_response(status: u16, body: &Value) -> TransportResponse {
    TransportResponse {
        status,
        content_type: Some("application/json".to_string()),
        body: body.to_string().into_bytes(),
    }
}

fn unscripted(method: &str, url: &str) -> TransportError {
    TransportError::Network(format!("no scripted reply for {} {}", method, url))
}

fn capped(reply: Reply, max_bytes: usize) -> Reply {
    match reply {
        Ok(response) if response.body.len() > max_bytes => Err(TransportError::TooLarge { limit: max_bytes }),
        other => other,
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &Value,
        timeout: Duration,
        max_bytes: usize,
    ) -> Result<TransportResponse, TransportError> {
        let mut script = self.lock();
        script.calls.push(RecordedCall {
            method: "POST",
            url: url.to_string(),
            bearer: Some(credential.expose().to_string()),
            body: Some(body.clone()),
            timeout,
            max_bytes,
        });
        let reply = match script.posts.pop_front() {
            Some(reply) => reply,
            None => script
                .post_fallback
                .clone()
                .unwrap_or_else(|| Err(unscripted("POST", url))),
        };
        capped(reply, max_bytes)
    }

    async fn get(&self, url: &str, timeout: Duration, max_bytes: usize) -> Result<TransportResponse, TransportError> {
        let mut script = self.lock();
        script.calls.push(RecordedCall {
            method: "GET",
            url: url.to_string(),
            bearer: None,
            body: None,
            timeout,
            max_bytes,
        });
        let reply = script.gets.pop_front().unwrap_or_else(|| Err(unscripted("GET", url)));
        capped(reply, max_bytes)
    }
}
