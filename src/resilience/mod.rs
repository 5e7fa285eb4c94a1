//! Resilience layer for service clients.
//!
//! Each client owns exactly one circuit breaker; the breaker's thresholds
//! are fixed for its lifetime and transitions are reported through a
//! [`BreakerListener`].

mod circuit_breaker;

pub use circuit_breaker::{BreakerListener, CircuitBreaker, CircuitState};
