//! Request execution pipeline.
//!
//! A [`PipelineBuilder`] decides whether a request can be issued for a
//! client at all and produces a [`RequestInvoker`]. The
//! [`RequestExecutor`] runs the invoker through the client's circuit
//! breaker and packages the outcome.

mod codec;
mod executor;

pub use codec::{JsonCodec, Marshaller, TextCodec, Unmarshaller};
pub use executor::RequestExecutor;

use std::sync::Arc;

use crate::client::ServiceClient;
use crate::errors::{ServiceError, ServiceResult};
use crate::transport::{HttpRequest, HttpTransport};
use crate::types::{ClientStatus, RawResponse};

/// Sends requests for one client.
#[derive(Clone)]
pub struct RequestInvoker {
    transport: Arc<dyn HttpTransport>,
}

impl RequestInvoker {
    /// Creates an invoker over the given transport.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Sends the request.
    pub async fn invoke(&self, request: HttpRequest) -> ServiceResult<RawResponse> {
        Ok(self.transport.send(request).await?)
    }
}

impl std::fmt::Debug for RequestInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestInvoker").finish_non_exhaustive()
    }
}

/// Builds the request invoker for a client.
///
/// A failure here is a pre-flight failure: the breaker is never consulted.
pub trait PipelineBuilder: Send + Sync {
    /// Builds an invoker for `client`.
    fn build(&self, client: &ServiceClient) -> ServiceResult<RequestInvoker>;
}

/// Pipeline builder sharing one transport across all clients.
///
/// Refuses clients that are marked down.
pub struct DefaultPipelineBuilder {
    transport: Arc<dyn HttpTransport>,
}

impl DefaultPipelineBuilder {
    /// Creates a builder over the given transport.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

impl PipelineBuilder for DefaultPipelineBuilder {
    fn build(&self, client: &ServiceClient) -> ServiceResult<RequestInvoker> {
        if client.status() == ClientStatus::Down {
            return Err(ServiceError::ClientMarkedDown {
                name: client.name().to_string(),
                environment: client.environment().clone(),
            });
        }
        Ok(RequestInvoker::new(Arc::clone(&self.transport)))
    }
}

impl std::fmt::Debug for DefaultPipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultPipelineBuilder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockTransport;
    use crate::types::{Endpoint, Environment};

    #[test]
    fn test_default_builder_refuses_marked_down_client() {
        let builder = DefaultPipelineBuilder::new(Arc::new(MockTransport::new()));
        let client = ServiceClient::new(
            "orders",
            Environment::Default,
            Endpoint::from_uri("http://orders"),
        );

        assert!(builder.build(&client).is_ok());

        client.mark_down();
        match builder.build(&client) {
            Err(ServiceError::ClientMarkedDown { name, .. }) => assert_eq!(name, "orders"),
            other => panic!("Expected ClientMarkedDown, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoker_maps_transport_errors() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_error(crate::transport::TransportError::Connection {
            message: "refused".to_string(),
        });

        let invoker = RequestInvoker::new(transport);
        let result = invoker.invoke(HttpRequest::get("http://orders/1")).await;
        assert!(matches!(result, Err(ServiceError::Transport(_))));
    }
}
