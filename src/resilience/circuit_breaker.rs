//! Circuit breaker implementation.
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     consecutive failures reach max_failures
//! Open     → HalfOpen: reset_timeout elapsed (checked on admission or state query)
//! HalfOpen → Closed:   the single trial call succeeds
//! HalfOpen → Open:     the trial call fails, reset timer restarts
//! ```

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerSettings;
use crate::errors::{ServiceError, ServiceResult};

/// Circuit breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, calls flow normally.
    Closed = 0,
    /// Circuit is open, calls are rejected.
    Open = 1,
    /// Circuit is trialing, one call allowed.
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Observer for circuit breaker transitions.
pub trait BreakerListener: Send + Sync {
    /// Called after the breaker opens.
    fn on_open(&self) {}

    /// Called after the breaker closes.
    fn on_close(&self) {}

    /// Called after the breaker moves to half-open.
    fn on_half_open(&self) {}
}

struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker guarding calls to a single service.
///
/// Thresholds and timeouts are fixed at construction.
pub struct CircuitBreaker {
    name: String,
    max_failures: u32,
    call_timeout: Duration,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
    listener: Option<Arc<dyn BreakerListener>>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker for the named service.
    pub fn new(name: impl Into<String>, settings: &CircuitBreakerSettings) -> Self {
        Self {
            name: name.into(),
            max_failures: settings.max_failures.max(1),
            call_timeout: settings.call_timeout,
            reset_timeout: settings.reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            listener: None,
        }
    }

    /// Registers the transition listener.
    pub fn with_listener(mut self, listener: Arc<dyn BreakerListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Returns the name of the guarded service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the failure threshold.
    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    /// Returns the per-call timeout.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Returns the reset timeout.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Returns the current state.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        let transition = self.maybe_half_open(&mut inner);
        let state = inner.state;
        drop(inner);

        self.notify(transition);
        state
    }

    /// Returns the number of consecutive failures.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Runs `operation` through the breaker.
    ///
    /// The operation is not invoked when the breaker rejects the call. An
    /// error result or exceeding the call timeout counts as a failure.
    pub async fn call<F, Fut, T>(&self, operation: F) -> ServiceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let Some(mut permit) = self.try_acquire() else {
            tracing::debug!(service = %self.name, "Circuit breaker rejected call");
            return Err(ServiceError::CircuitOpen {
                name: self.name.clone(),
            });
        };

        let outcome = match tokio::time::timeout(self.call_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::CallTimeout {
                timeout: self.call_timeout,
            }),
        };

        match &outcome {
            Ok(_) => permit.succeed(),
            Err(e) => {
                tracing::debug!(service = %self.name, error = %e, "Guarded call failed");
                permit.fail();
            }
        }

        outcome
    }

    fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut inner = self.inner.lock();
        let transition = self.maybe_half_open(&mut inner);

        let permit = match inner.state {
            CircuitState::Closed => Some(false),
            CircuitState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                Some(true)
            }
            CircuitState::HalfOpen | CircuitState::Open => None,
        };
        drop(inner);

        self.notify(transition);
        permit.map(|trial| CallPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn record_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        let transition = match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                None
            }
            CircuitState::HalfOpen if trial => {
                tracing::info!(
                    service = %self.name,
                    "Circuit breaker closing after successful trial call"
                );
                inner.trial_in_flight = false;
                inner.failure_count = 0;
                inner.opened_at = None;
                Some(self.transition(&mut inner, CircuitState::Closed))
            }
            // Late results from calls admitted before the breaker opened.
            CircuitState::HalfOpen | CircuitState::Open => None,
        };
        drop(inner);

        self.notify(transition);
    }

    fn record_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        let transition = match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.max_failures {
                    tracing::warn!(
                        service = %self.name,
                        failures = inner.failure_count,
                        threshold = self.max_failures,
                        "Circuit breaker opening"
                    );
                    inner.opened_at = Some(Instant::now());
                    Some(self.transition(&mut inner, CircuitState::Open))
                } else {
                    None
                }
            }
            CircuitState::HalfOpen if trial => {
                tracing::info!(
                    service = %self.name,
                    "Circuit breaker re-opening after failed trial call"
                );
                inner.trial_in_flight = false;
                inner.opened_at = Some(Instant::now());
                Some(self.transition(&mut inner, CircuitState::Open))
            }
            CircuitState::HalfOpen | CircuitState::Open => None,
        };
        drop(inner);

        self.notify(transition);
    }

    fn maybe_half_open(&self, inner: &mut BreakerInner) -> Option<CircuitState> {
        if inner.state != CircuitState::Open {
            return None;
        }
        let elapsed = inner.opened_at.map_or(Duration::MAX, |at| at.elapsed());
        if elapsed < self.reset_timeout {
            return None;
        }

        tracing::info!(service = %self.name, "Circuit breaker transitioning to half-open");
        inner.trial_in_flight = false;
        Some(self.transition(inner, CircuitState::HalfOpen))
    }

    fn transition(&self, inner: &mut BreakerInner, new_state: CircuitState) -> CircuitState {
        inner.state = new_state;
        new_state
    }

    fn notify(&self, transition: Option<CircuitState>) {
        let (Some(state), Some(listener)) = (transition, self.listener.as_ref()) else {
            return;
        };
        match state {
            CircuitState::Open => listener.on_open(),
            CircuitState::Closed => listener.on_close(),
            CircuitState::HalfOpen => listener.on_half_open(),
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .field("max_failures", &self.max_failures)
            .field("call_timeout", &self.call_timeout)
            .field("reset_timeout", &self.reset_timeout)
            .finish()
    }
}

/// Admission to run one call. Settles the breaker exactly once.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CallPermit<'_> {
    fn succeed(&mut self) {
        self.settled = true;
        self.breaker.record_success(self.trial);
    }

    fn fail(&mut self) {
        self.settled = true;
        self.breaker.record_failure(self.trial);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        // An abandoned trial would otherwise leave the breaker half-open forever.
        if !self.settled && self.trial {
            self.breaker.record_failure(true);
        }
    }
}
