//! Service client handle.
//!
//! A [`ServiceClient`] bundles a resolved endpoint, its liveness status,
//! and the circuit breaker that guards every call made through it.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::resilience::{BreakerListener, CircuitBreaker, CircuitState};
use crate::types::{ClientStatus, Endpoint, Environment};

/// Named, environment-scoped handle to a remote service.
///
/// Clients are shared as `Arc<ServiceClient>`; `status`, `breaker_status`
/// and the endpoint may change while other tasks are issuing calls.
pub struct ServiceClient {
    name: String,
    environment: Environment,
    endpoint: RwLock<Arc<Endpoint>>,
    status: AtomicU8,
    breaker: Arc<CircuitBreaker>,
    breaker_status: Arc<AtomicU8>,
}

impl ServiceClient {
    /// Creates a client and its circuit breaker from the endpoint's configuration.
    pub fn new(name: impl Into<String>, environment: Environment, endpoint: Endpoint) -> Self {
        Self::with_status(name, environment, endpoint, ClientStatus::Up)
    }

    pub(crate) fn with_status(
        name: impl Into<String>,
        environment: Environment,
        endpoint: Endpoint,
        status: ClientStatus,
    ) -> Self {
        let name = name.into();
        let breaker_status = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let mirror = Arc::new(BreakerStatusMirror {
            state: Arc::clone(&breaker_status),
        });
        let breaker = CircuitBreaker::new(name.clone(), &endpoint.config.circuit_breaker)
            .with_listener(mirror);

        tracing::debug!(
            service = %name,
            environment = %environment,
            uri = %endpoint.uri,
            "Creating service client"
        );

        Self {
            name,
            environment,
            endpoint: RwLock::new(Arc::new(endpoint)),
            status: AtomicU8::new(status as u8),
            breaker: Arc::new(breaker),
            breaker_status,
        }
    }

    /// Returns the logical service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the resolved environment.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Returns the current endpoint.
    pub fn endpoint(&self) -> Arc<Endpoint> {
        Arc::clone(&*self.endpoint.read())
    }

    /// Replaces the endpoint wholesale.
    pub(crate) fn set_endpoint(&self, endpoint: Endpoint) {
        *self.endpoint.write() = Arc::new(endpoint);
    }

    /// Returns the liveness status.
    pub fn status(&self) -> ClientStatus {
        ClientStatus::from(self.status.load(Ordering::Acquire))
    }

    /// Marks the client down; calls short-circuit before the breaker.
    pub fn mark_down(&self) {
        let previous = self.status.swap(ClientStatus::Down as u8, Ordering::AcqRel);
        if previous != ClientStatus::Down as u8 {
            tracing::info!(
                service = %self.name,
                environment = %self.environment,
                "Client marked down"
            );
        }
    }

    /// Marks the client up.
    pub fn mark_up(&self) {
        let previous = self.status.swap(ClientStatus::Up as u8, Ordering::AcqRel);
        if previous != ClientStatus::Up as u8 {
            tracing::info!(
                service = %self.name,
                environment = %self.environment,
                "Client marked up"
            );
        }
    }

    /// Returns the circuit breaker guarding this client.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Returns the last breaker state reported through transition notifications.
    ///
    /// The move from open to half-open is only observed when the breaker admits
    /// a call or `breaker().state()` is queried, so this keeps reporting
    /// `Open` after `reset_timeout` has elapsed until one of those happens.
    pub fn breaker_status(&self) -> CircuitState {
        CircuitState::from(self.breaker_status.load(Ordering::Acquire))
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("name", &self.name)
            .field("environment", &self.environment)
            .field("uri", &self.endpoint.read().uri)
            .field("status", &self.status())
            .field("breaker_status", &self.breaker_status())
            .finish()
    }
}

/// Keeps a client's `breaker_status` in step with its breaker.
struct BreakerStatusMirror {
    state: Arc<AtomicU8>,
}

impl BreakerListener for BreakerStatusMirror {
    fn on_open(&self) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
    }

    fn on_close(&self) {
        self.state.store(CircuitState::Closed as u8, Ordering::Release);
    }

    fn on_half_open(&self) {
        self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
    }
}
