//! Mock implementations for testing.
//!
//! Provides transport, pipeline, resolver and observer doubles for unit
//! and integration tests that must not touch the network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::client::ServiceClient;
use crate::errors::{ServiceError, ServiceResult};
use crate::observability::{RegistryInfo, RegistryMonitor};
use crate::pipeline::{PipelineBuilder, RequestInvoker};
use crate::resilience::BreakerListener;
use crate::resolver::EndpointResolver;
use crate::transport::{HttpRequest, HttpTransport, TransportError};
use crate::types::{Endpoint, Environment, RawResponse};

/// Mock HTTP transport replaying queued outcomes in order.
pub struct MockTransport {
    outcomes: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    default_outcome: Mutex<Option<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    /// Creates a transport with nothing queued.
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            default_outcome: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        }
    }

    /// Queues a response.
    pub fn queue(&self, response: RawResponse) {
        self.outcomes.lock().push_back(Ok(response));
    }

    /// Queues a transport error.
    pub fn queue_error(&self, error: TransportError) {
        self.outcomes.lock().push_back(Err(error));
    }

    /// Sets the outcome returned once the queue is empty.
    pub fn set_default(&self, outcome: Result<RawResponse, TransportError>) {
        *self.default_outcome.lock() = Some(outcome);
    }

    /// Delays every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Returns the recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Returns the last recorded request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }

    /// Returns the number of requests sent.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().push(request);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.outcomes.lock().pop_front();
        match next {
            Some(outcome) => outcome,
            None => self.default_outcome.lock().clone().unwrap_or_else(|| {
                Err(TransportError::InvalidResponse {
                    message: "No mock response configured".to_string(),
                })
            }),
        }
    }
}

/// Pipeline builder that always fails with the configured error.
pub struct MockPipelineBuilder {
    error: ServiceError,
    calls: AtomicUsize,
}

impl MockPipelineBuilder {
    /// Creates a builder failing with `error`.
    pub fn failing(error: ServiceError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many pipelines were requested.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PipelineBuilder for MockPipelineBuilder {
    fn build(&self, _client: &ServiceClient) -> ServiceResult<RequestInvoker> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Endpoint resolver counting lookups.
pub struct CountingEndpointResolver {
    inner: Arc<dyn EndpointResolver>,
    lookups: AtomicUsize,
}

impl CountingEndpointResolver {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn EndpointResolver>) -> Self {
        Self {
            inner,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Returns the number of lookups performed.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl EndpointResolver for CountingEndpointResolver {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn resolve(&self, service: &str, environment: &Environment) -> Option<Endpoint> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(service, environment)
    }
}

/// Breaker transition recorded by [`RecordingListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The breaker opened.
    Open,
    /// The breaker closed.
    Close,
    /// The breaker moved to half-open.
    HalfOpen,
}

/// Breaker listener recording every notification.
#[derive(Default)]
pub struct RecordingListener {
    transitions: Mutex<Vec<Transition>>,
}

impl RecordingListener {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded transitions in order.
    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions.lock().clone()
    }
}

impl BreakerListener for RecordingListener {
    fn on_open(&self) {
        self.transitions.lock().push(Transition::Open);
    }

    fn on_close(&self) {
        self.transitions.lock().push(Transition::Close);
    }

    fn on_half_open(&self) {
        self.transitions.lock().push(Transition::HalfOpen);
    }
}

/// Monitor recording every registration.
#[derive(Default)]
pub struct RecordingMonitor {
    registrations: Mutex<Vec<RegistryInfo>>,
}

impl RecordingMonitor {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded registrations.
    pub fn registrations(&self) -> Vec<RegistryInfo> {
        self.registrations.lock().clone()
    }
}

impl RegistryMonitor for RecordingMonitor {
    fn register(&self, info: &RegistryInfo) {
        self.registrations.lock().push(info.clone());
    }
}
