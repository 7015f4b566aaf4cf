//! Mock transport for testing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::traits::Transport;
use crate::error::TransportError;

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub plural: String,
    pub body: Vec<Value>,
    pub background: bool,
}

type Responder = dyn Fn(&RecordedRequest) -> Result<Value, TransportError> + Send + Sync;

/// Mock transport for testing.
///
/// By default every item is answered with `[201, item]`, which is what the
/// collection API does for a clean create.
pub struct MockTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    responder: Box<Responder>,
    latency: Duration,
    failing: Mutex<HashSet<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Create an echoing mock transport.
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(|request| Ok(echo(request))),
            latency: Duration::ZERO,
            failing: Mutex::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Answer requests with a custom responder.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&RecordedRequest) -> Result<Value, TransportError> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Box::new(responder);
        self
    }

    /// Delay every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every request to this collection with a 500.
    pub fn fail_collection(&self, plural: impl Into<String>) {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner).insert(plural.into());
    }

    /// All requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests seen so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Highest number of requests that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Answer every item of a request with `[201, item]`.
pub fn echo(request: &RecordedRequest) -> Value {
    Value::Array(request.body.iter().map(|item| json!([201, item])).collect())
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_collection(
        &self,
        plural: &str,
        body: Vec<Value>,
        background: bool,
    ) -> Result<Value, TransportError> {
        let request = RecordedRequest {
            plural: plural.to_string(),
            body,
            background,
        };
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.lock().unwrap_or_else(PoisonError::into_inner).contains(plural) {
            return Err(TransportError::Status {
                status: 500,
                body: "mock failure".to_string(),
            });
        }

        (self.responder)(&request)
    }
}
