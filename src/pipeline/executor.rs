//! Breaker-guarded request execution with fallback policy.

use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use super::codec::Unmarshaller;
use super::RequestInvoker;
use crate::client::ServiceClient;
use crate::errors::{ServiceError, ServiceResult};
use crate::observability::MetricsCollector;
use crate::transport::HttpRequest;
use crate::types::{RawResponse, ResponseWrapper, TypedResponseWrapper};

/// Which side of the fallback race supplied the response.
enum Served {
    Primary(RawResponse),
    Fallback(RawResponse),
}

/// Runs requests through a client's circuit breaker.
///
/// Every path yields either `Ok` with a wrapper (possibly carrying an
/// error) or `Err` when the breaker-level failure was not absorbed by a
/// fallback.
pub struct RequestExecutor {
    metrics: Arc<dyn MetricsCollector>,
}

impl RequestExecutor {
    /// Creates an executor reporting to the given metrics collector.
    pub fn new(metrics: Arc<dyn MetricsCollector>) -> Self {
        Self { metrics }
    }

    /// Executes a request and wraps the raw outcome.
    #[instrument(skip_all, fields(service = %client.name(), method = %request.method))]
    pub async fn handle(
        &self,
        client: &ServiceClient,
        pipeline: ServiceResult<RequestInvoker>,
        request: HttpRequest,
    ) -> ServiceResult<ResponseWrapper> {
        let invoker = match pipeline {
            Ok(invoker) => invoker,
            Err(e) => {
                let status_code = self.preflight_failed(client, &e);
                return Ok(ResponseWrapper::from_error(status_code, e));
            }
        };

        match self.execute(client, &invoker, request).await? {
            Served::Primary(response) | Served::Fallback(response) => {
                Ok(ResponseWrapper::from_response(response))
            }
        }
    }

    /// Executes a request and converts the body with `unmarshaller`.
    #[instrument(skip_all, fields(service = %client.name(), method = %request.method))]
    pub async fn handle_entity<T, U>(
        &self,
        client: &ServiceClient,
        pipeline: ServiceResult<RequestInvoker>,
        request: HttpRequest,
        unmarshaller: &U,
    ) -> ServiceResult<TypedResponseWrapper<T>>
    where
        U: Unmarshaller<T> + ?Sized,
    {
        let invoker = match pipeline {
            Ok(invoker) => invoker,
            Err(e) => {
                let status_code = self.preflight_failed(client, &e);
                return Ok(TypedResponseWrapper::from_error(status_code, e));
            }
        };

        let wrapper = match self.execute(client, &invoker, request).await? {
            Served::Primary(response) => typed(response, unmarshaller, |e| e),
            Served::Fallback(response) => typed(response, unmarshaller, |e| {
                ServiceError::pipeline(e.to_string())
            }),
        };
        Ok(wrapper)
    }

    fn preflight_failed(&self, client: &ServiceClient, error: &ServiceError) -> u16 {
        let status_code = error.status_code();
        tracing::warn!(
            service = %client.name(),
            environment = %client.environment(),
            status_code,
            error = %error,
            "Request failed before reaching the circuit breaker"
        );
        self.metrics.record_preflight_failure(client.name(), status_code);
        status_code
    }

    /// Runs the guarded call; a configured fallback replaces breaker-level
    /// failures. The call's own result wins whenever it succeeds.
    async fn execute(
        &self,
        client: &ServiceClient,
        invoker: &RequestInvoker,
        request: HttpRequest,
    ) -> ServiceResult<Served> {
        let fallback = client.endpoint().config.fallback_response().cloned();
        let started = Instant::now();

        let outcome = client.breaker().call(|| invoker.invoke(request)).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(response) => {
                self.metrics
                    .record_request(client.name(), response.is_success(), elapsed);
                Ok(Served::Primary(response))
            }
            Err(e) => {
                if matches!(e, ServiceError::CircuitOpen { .. }) {
                    self.metrics.record_rejection(client.name());
                } else {
                    self.metrics.record_request(client.name(), false, elapsed);
                }

                match fallback {
                    Some(response) if e.is_breaker_failure() => {
                        tracing::info!(
                            service = %client.name(),
                            error = %e,
                            status = response.status,
                            "Serving fallback response"
                        );
                        self.metrics.record_fallback(client.name());
                        Ok(Served::Fallback(response))
                    }
                    _ => Err(e),
                }
            }
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor").finish_non_exhaustive()
    }
}

fn typed<T, U>(
    response: RawResponse,
    unmarshaller: &U,
    map_unmarshal_error: impl FnOnce(ServiceError) -> ServiceError,
) -> TypedResponseWrapper<T>
where
    U: Unmarshaller<T> + ?Sized,
{
    let value = if response.is_success() {
        unmarshaller.unmarshal(&response).map_err(map_unmarshal_error)
    } else {
        Err(ServiceError::UnsuccessfulResponse {
            response: response.clone(),
        })
    };

    TypedResponseWrapper {
        status_code: response.status,
        value,
        raw_response: Some(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::errors::{MARK_DOWN_ERROR_CODE, PIPELINE_ERROR_CODE};
    use crate::mocks::MockTransport;
    use crate::observability::DefaultMetricsCollector;
    use crate::pipeline::JsonCodec;
    use crate::resilience::CircuitState;
    use crate::transport::TransportError;
    use crate::types::{Endpoint, Environment};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Order {
        id: u64,
    }

    type Fixture = (
        ServiceClient,
        Arc<MockTransport>,
        RequestExecutor,
        Arc<DefaultMetricsCollector>,
    );

    fn invoker(transport: &Arc<MockTransport>) -> ServiceResult<RequestInvoker> {
        Ok(RequestInvoker::new(transport.clone()))
    }

    fn setup(config: Configuration) -> Fixture {
        let client = ServiceClient::new(
            "orders",
            Environment::Default,
            Endpoint::new("http://orders", config),
        );
        let transport = Arc::new(MockTransport::new());
        let metrics = Arc::new(DefaultMetricsCollector::new());
        let executor = RequestExecutor::new(metrics.clone());
        (client, transport, executor, metrics)
    }

    fn refused() -> TransportError {
        TransportError::Connection {
            message: "refused".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_is_wrapped() {
        let (client, transport, executor, metrics) = setup(Configuration::default());
        transport.queue(RawResponse::new(200, "ok"));

        let wrapper = executor
            .handle(&client, invoker(&transport), HttpRequest::get("http://orders/1"))
            .await
            .unwrap();

        assert_eq!(wrapper.status_code, 200);
        assert_eq!(wrapper.body.unwrap().text(), "ok");
        assert_eq!(metrics.get_metrics().successful_requests, 1);
    }

    #[tokio::test]
    async fn test_marked_down_short_circuits() {
        let (client, transport, executor, _) = setup(Configuration::default());
        let error = ServiceError::ClientMarkedDown {
            name: "orders".to_string(),
            environment: Environment::Default,
        };

        let wrapper = executor
            .handle(&client, Err(error), HttpRequest::get("http://orders/1"))
            .await
            .unwrap();

        assert_eq!(wrapper.status_code, MARK_DOWN_ERROR_CODE);
        assert!(matches!(wrapper.body, Err(ServiceError::ClientMarkedDown { .. })));
        assert_eq!(transport.request_count(), 0);
        assert_eq!(client.breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn test_generic_preflight_failure_uses_999() {
        let (client, _, executor, metrics) = setup(Configuration::default());

        let wrapper = executor
            .handle(
                &client,
                Err(ServiceError::pipeline("no pool")),
                HttpRequest::get("http://orders/1"),
            )
            .await
            .unwrap();

        assert_eq!(wrapper.status_code, PIPELINE_ERROR_CODE);
        assert!(matches!(wrapper.body, Err(ServiceError::Pipeline { .. })));
        assert_eq!(metrics.get_metrics().preflight_failures, 1);
    }

    #[tokio::test]
    async fn test_failure_without_fallback_propagates() {
        let (client, transport, executor, _) = setup(Configuration::default());
        transport.queue_error(refused());

        let result = executor
            .handle(&client, invoker(&transport), HttpRequest::get("http://orders/1"))
            .await;

        assert!(matches!(result, Err(ServiceError::Transport(_))));
        assert_eq!(client.breaker().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_open_breaker_without_fallback_fails() {
        let config = Configuration::builder().max_failures(1).build().unwrap();
        let (client, transport, executor, metrics) = setup(config);
        transport.queue_error(refused());
        let invoker = RequestInvoker::new(transport.clone());

        let _ = executor
            .handle(&client, Ok(invoker.clone()), HttpRequest::get("http://orders/1"))
            .await;
        assert_eq!(client.breaker_status(), CircuitState::Open);

        let result = executor
            .handle(&client, Ok(invoker), HttpRequest::get("http://orders/1"))
            .await;
        assert!(matches!(result, Err(ServiceError::CircuitOpen { .. })));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(metrics.get_metrics().rejected_requests, 1);
    }

    #[tokio::test]
    async fn test_open_breaker_with_fallback_serves_fallback() {
        let config = Configuration::builder()
            .max_failures(1)
            .fallback(RawResponse::new(200, "{}"))
            .build()
            .unwrap();
        let (client, transport, executor, metrics) = setup(config);
        transport.queue_error(refused());
        let invoker = RequestInvoker::new(transport.clone());

        // The failing call itself is absorbed by the fallback.
        let first = executor
            .handle(&client, Ok(invoker.clone()), HttpRequest::get("http://orders/1"))
            .await
            .unwrap();
        assert_eq!(first.status_code, 200);

        let second = executor
            .handle(&client, Ok(invoker), HttpRequest::get("http://orders/1"))
            .await
            .unwrap();
        assert_eq!(second.status_code, 200);
        assert_eq!(second.body.unwrap().text(), "{}");
        assert_eq!(transport.request_count(), 1);
        assert_eq!(metrics.get_metrics().fallbacks_served, 2);
    }

    #[tokio::test]
    async fn test_primary_success_wins_over_fallback() {
        let config = Configuration::builder()
            .fallback(RawResponse::new(200, "fallback"))
            .build()
            .unwrap();
        let (client, transport, executor, _) = setup(config);
        transport.queue(RawResponse::new(500, "primary"));

        let wrapper = executor
            .handle(&client, invoker(&transport), HttpRequest::get("http://orders/1"))
            .await
            .unwrap();

        assert_eq!(wrapper.status_code, 500);
        assert_eq!(wrapper.body.unwrap().text(), "primary");
    }

    #[tokio::test]
    async fn test_timeout_with_fallback_serves_fallback() {
        let config = Configuration::builder()
            .call_timeout(Duration::from_millis(10))
            .fallback(RawResponse::new(203, "cached"))
            .build()
            .unwrap();
        let (client, transport, executor, _) = setup(config);
        transport.set_delay(Duration::from_millis(200));
        transport.queue(RawResponse::new(200, "late"));

        let wrapper = executor
            .handle(&client, invoker(&transport), HttpRequest::get("http://orders/1"))
            .await
            .unwrap();

        assert_eq!(wrapper.status_code, 203);
        assert_eq!(client.breaker().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_typed_primary_success() {
        let (client, transport, executor, _) = setup(Configuration::default());
        transport.queue(RawResponse::new(200, r#"{"id":123}"#));

        let wrapper: TypedResponseWrapper<Order> = executor
            .handle_entity(
                &client,
                invoker(&transport),
                HttpRequest::get("http://orders/123"),
                &JsonCodec,
            )
            .await
            .unwrap();

        assert_eq!(wrapper.status_code, 200);
        assert_eq!(wrapper.value.unwrap(), Order { id: 123 });
        assert!(wrapper.raw_response.is_some());
    }

    #[tokio::test]
    async fn test_typed_primary_unsuccessful_status() {
        let (client, transport, executor, _) = setup(Configuration::default());
        transport.queue(RawResponse::new(404, "missing"));

        let wrapper: TypedResponseWrapper<Order> = executor
            .handle_entity(
                &client,
                invoker(&transport),
                HttpRequest::get("http://orders/9"),
                &JsonCodec,
            )
            .await
            .unwrap();

        assert_eq!(wrapper.status_code, 404);
        assert!(matches!(wrapper.value, Err(ServiceError::UnsuccessfulResponse { .. })));
    }

    #[tokio::test]
    async fn test_typed_preflight_has_no_raw_response() {
        let (client, _, executor, _) = setup(Configuration::default());

        let wrapper: TypedResponseWrapper<Order> = executor
            .handle_entity(
                &client,
                Err(ServiceError::pipeline("broken")),
                HttpRequest::get("http://orders/1"),
                &JsonCodec,
            )
            .await
            .unwrap();

        assert_eq!(wrapper.status_code, PIPELINE_ERROR_CODE);
        assert!(wrapper.raw_response.is_none());
        assert!(wrapper.value.is_err());
    }

    #[tokio::test]
    async fn test_typed_fallback_unmarshal_failure_is_pipeline_error() {
        let fallback = RawResponse::new(200, "not json");
        let config = Configuration::builder()
            .fallback(fallback.clone())
            .build()
            .unwrap();
        let (client, transport, executor, _) = setup(config);
        transport.queue_error(refused());

        let wrapper: TypedResponseWrapper<Order> = executor
            .handle_entity(
                &client,
                invoker(&transport),
                HttpRequest::get("http://orders/1"),
                &JsonCodec,
            )
            .await
            .unwrap();

        assert!(matches!(wrapper.value, Err(ServiceError::Pipeline { .. })));
        assert_eq!(wrapper.raw_response, Some(fallback));
    }

    #[tokio::test]
    async fn test_typed_fallback_unsuccessful_status() {
        let fallback = RawResponse::new(503, "unavailable");
        let config = Configuration::builder()
            .fallback(fallback.clone())
            .build()
            .unwrap();
        let (client, transport, executor, _) = setup(config);
        transport.queue_error(refused());

        let wrapper: TypedResponseWrapper<Order> = executor
            .handle_entity(
                &client,
                invoker(&transport),
                HttpRequest::get("http://orders/1"),
                &JsonCodec,
            )
            .await
            .unwrap();

        assert_eq!(wrapper.status_code, 503);
        match wrapper.value {
            Err(ServiceError::UnsuccessfulResponse { response }) => assert_eq!(response, fallback),
            other => panic!("Expected UnsuccessfulResponse, got {:?}", other),
        }
        assert_eq!(wrapper.raw_response, Some(fallback));
    }
}
