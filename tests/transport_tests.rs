//! Tests running the registry over the reqwest transport.

use pretty_assertions::assert_eq;
use serde::Deserialize;
use service_registry::{
    Configuration, Endpoint, Environment, HttpTransportImpl, JsonCodec, ServiceRegistry,
    StaticEndpointResolver, TypedResponseWrapper,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, PartialEq, Deserialize)]
struct Order {
    id: u64,
}

async fn registry_for(server: &MockServer, config: Configuration) -> ServiceRegistry {
    let resolver = StaticEndpointResolver::new("static").with_endpoint(
        "orders",
        Environment::Default,
        Endpoint::parse(&server.uri(), config).unwrap(),
    );
    ServiceRegistry::builder()
        .endpoint_resolver(Arc::new(resolver))
        .transport(Arc::new(HttpTransportImpl::with_defaults().unwrap()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_entity_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/123"))
        .and(header("x-caller", "checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":123}"#))
        .mount(&server)
        .await;

    let config = Configuration::builder().header("x-caller", "checkout").build().unwrap();
    let registry = registry_for(&server, config).await;
    let orders = registry.caller("orders", &Environment::Default).unwrap();

    let wrapper: TypedResponseWrapper<Order> =
        orders.get_entity("orders/123", &JsonCodec).await.unwrap();
    assert_eq!(wrapper.value.unwrap(), Order { id: 123 });
}

#[tokio::test]
async fn test_slow_server_trips_call_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let config = Configuration::builder()
        .max_failures(1)
        .call_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let registry = registry_for(&server, config).await;
    let orders = registry.caller("orders", &Environment::Default).unwrap();

    let result = orders.get("orders/1").await;
    assert!(matches!(
        result,
        Err(service_registry::ServiceError::CallTimeout { .. })
    ));
    assert!(matches!(
        orders.get("orders/1").await,
        Err(service_registry::ServiceError::CircuitOpen { .. })
    ));
}
