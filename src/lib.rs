//! Service Registry Client
//!
//! A resilient client-side registry for named remote HTTP services. A
//! logical service name plus a deployment environment resolves to a
//! concrete endpoint; every call made through the resulting client runs
//! through that client's own circuit breaker and comes back as a uniform
//! response wrapper, raw or typed.
//!
//! # Features
//!
//! - **Client cache**: one client per (name, environment), created on first lookup
//! - **Circuit breaker**: closed / open / half-open with call and reset timeouts
//! - **Fallbacks**: a configured response replaces breaker-level failures
//! - **Pre-flight codes**: marked-down clients report 998, other pipeline failures 999
//! - **Typed calls**: pluggable marshallers and unmarshallers, JSON out of the box
//! - **Observability**: `tracing` events, request metrics, monitor registration
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use service_registry::{
//!     Environment, JsonCodec, ServiceRegistry, StaticEndpointResolver, TypedResponseWrapper,
//! };
//!
//! #[derive(serde::Deserialize)]
//! struct Order {
//!     id: u64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = StaticEndpointResolver::new("static")
//!         .with_uri("orders", Environment::Default, "http://orders.internal:8080");
//!
//!     let registry = ServiceRegistry::builder()
//!         .endpoint_resolver(Arc::new(resolver))
//!         .build()?;
//!
//!     let orders = registry.caller("orders", &Environment::Default)?;
//!     let response: TypedResponseWrapper<Order> =
//!         orders.get_entity("orders/123", &JsonCodec).await?;
//!     if let Ok(order) = response.value {
//!         println!("order {}", order.id);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod resilience;
pub mod resolver;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::ServiceClient;
pub use config::{CircuitBreakerSettings, Configuration, ConfigurationBuilder};
pub use errors::{ServiceError, ServiceResult, MARK_DOWN_ERROR_CODE, PIPELINE_ERROR_CODE};
pub use pipeline::{
    DefaultPipelineBuilder, JsonCodec, Marshaller, PipelineBuilder, RequestExecutor,
    RequestInvoker, TextCodec, Unmarshaller,
};
pub use registry::{ServiceRegistry, ServiceRegistryBuilder};
pub use resilience::{BreakerListener, CircuitBreaker, CircuitState};
pub use resolver::{
    EndpointResolver, EndpointResolverRegistry, EnvironmentResolver, EnvironmentResolverRegistry,
    StaticEndpointResolver, StaticEnvironmentResolver,
};
pub use services::ServiceCaller;
pub use transport::{HttpMethod, HttpRequest, HttpTransport, HttpTransportImpl, TransportError};
pub use types::{
    ClientStatus, Endpoint, Environment, RawResponse, ResponseWrapper, TypedResponseWrapper,
};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
