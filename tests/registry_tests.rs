//! Tests for client caching and reconfiguration.

use pretty_assertions::assert_eq;
use service_registry::errors::ServiceError;
use service_registry::mocks::{CountingEndpointResolver, MockTransport};
use service_registry::transport::TransportError;
use service_registry::{
    CircuitState, Configuration, Endpoint, Environment, ServiceRegistry, StaticEndpointResolver,
    StaticEnvironmentResolver,
};
use std::sync::Arc;
use test_case::test_case;

fn registry() -> (ServiceRegistry, Arc<CountingEndpointResolver>) {
    let endpoints = StaticEndpointResolver::new("static")
        .with_uri("orders", Environment::Default, "http://orders.prod")
        .with_uri("orders", "staging", "http://orders.staging")
        .with_uri("billing", "staging", "http://billing.staging");
    let resolver = Arc::new(CountingEndpointResolver::new(Arc::new(endpoints)));

    let registry = ServiceRegistry::builder()
        .endpoint_resolver(resolver.clone())
        .environment_resolver(Arc::new(StaticEnvironmentResolver::new("env")))
        .transport(Arc::new(MockTransport::new()))
        .build()
        .unwrap();
    (registry, resolver)
}

#[test_case("orders", "default")]
#[test_case("orders", "staging")]
#[test_case("billing", "staging")]
fn test_repeated_get_returns_same_instance(name: &str, environment: &str) {
    let (registry, resolver) = registry();
    let environment = Environment::named(environment);

    let first = registry.get(name, &environment).unwrap();
    let second = registry.get(name, &environment).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(resolver.lookups(), 1);
}

#[test_case("billing", "default")]
#[test_case("inventory", "staging")]
fn test_unresolvable_pair_fails(name: &str, environment: &str) {
    let (registry, _) = registry();
    let requested = Environment::named(environment);

    match registry.get(name, &requested) {
        Err(ServiceError::EndpointNotFound {
            name: error_name,
            environment: error_environment,
        }) => {
            assert_eq!(error_name, name);
            assert_eq!(error_environment, requested);
        }
        other => panic!("Expected EndpointNotFound, got {:?}", other),
    }
}

#[test]
fn test_with_config_breaker_identity() {
    let (registry, _) = registry();
    let client = registry.get("orders", &Environment::Default).unwrap();
    let breaker = Arc::clone(client.breaker());

    let same = registry.with_config(&client, Configuration::default());
    assert!(Arc::ptr_eq(&breaker, same.breaker()));

    let changed = Configuration::builder().max_failures(3).build().unwrap();
    let replaced = registry.with_config(&client, changed);
    assert!(!Arc::ptr_eq(&breaker, replaced.breaker()));

    let cached = registry.get("orders", &Environment::Default).unwrap();
    assert!(Arc::ptr_eq(&cached, &replaced));
    assert_eq!(cached.breaker().max_failures(), 3);
}

#[tokio::test]
async fn test_concurrent_get_creates_one_client() {
    let (registry, resolver) = registry();
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry.get("orders", &Environment::named("staging")).unwrap()
            })
        })
        .collect();

    let clients: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    assert!((1..=16).contains(&resolver.lookups()));
    assert_eq!(registry.len(), 1);
}

fn pinned_registry(
    config: Configuration,
) -> (ServiceRegistry, Arc<CountingEndpointResolver>, Arc<MockTransport>) {
    let endpoints = StaticEndpointResolver::new("static").with_endpoint(
        "orders",
        "qa",
        Endpoint::new("http://orders.qa", config),
    );
    let resolver = Arc::new(CountingEndpointResolver::new(Arc::new(endpoints)));
    let transport = Arc::new(MockTransport::new());

    let registry = ServiceRegistry::builder()
        .endpoint_resolver(resolver.clone())
        .environment_resolver(Arc::new(
            StaticEnvironmentResolver::new("env").with_service("orders", "qa"),
        ))
        .transport(transport.clone())
        .build()
        .unwrap();
    (registry, resolver, transport)
}

#[test]
fn test_default_lookup_resolving_to_named_environment_is_cached() {
    let (registry, resolver, _) = pinned_registry(Configuration::default());

    let first = registry.get("orders", &Environment::Default).unwrap();
    let second = registry.get("orders", &Environment::Default).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(resolver.lookups(), 1);
    assert_eq!(first.environment(), &Environment::named("qa"));
    assert_eq!(
        registry.keys(),
        vec![("orders".to_string(), Environment::Default)]
    );
}

#[tokio::test]
async fn test_breaker_opens_through_default_environment_caller() {
    let config = Configuration::builder().max_failures(2).build().unwrap();
    let (registry, _, transport) = pinned_registry(config);
    transport.set_default(Err(TransportError::Connection {
        message: "refused".to_string(),
    }));

    for _ in 0..2 {
        let orders = registry.caller("orders", &Environment::Default).unwrap();
        assert!(matches!(
            orders.get("orders/1").await,
            Err(ServiceError::Transport(_))
        ));
    }

    let orders = registry.caller("orders", &Environment::Default).unwrap();
    assert!(matches!(
        orders.get("orders/1").await,
        Err(ServiceError::CircuitOpen { .. })
    ));
    assert_eq!(orders.client().breaker_status(), CircuitState::Open);
    assert_eq!(transport.request_count(), 2);
}
