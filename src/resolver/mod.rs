//! Endpoint and environment resolution.
//!
//! The registry depends only on the [`EndpointResolver`] and
//! [`EnvironmentResolver`] traits. The resolver registries chain several
//! resolvers together; the most recently registered one is consulted first.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Configuration;
use crate::types::{Endpoint, Environment};

/// Resolves a logical service name to a concrete endpoint.
///
/// The registry calls `resolve` without holding any of its locks, so an
/// implementation may call back into the registry. Concurrent first lookups
/// of the same service may call it more than once.
pub trait EndpointResolver: Send + Sync {
    /// Name identifying this resolver in a registry.
    fn name(&self) -> &str;

    /// Resolves the endpoint for `service` in `environment`.
    fn resolve(&self, service: &str, environment: &Environment) -> Option<Endpoint>;
}

/// Resolves the deployment environment for a service.
pub trait EnvironmentResolver: Send + Sync {
    /// Name identifying this resolver in a registry.
    fn name(&self) -> &str;

    /// Resolves the environment for `service`.
    ///
    /// Returning [`Environment::Default`] means "no opinion".
    fn resolve(&self, service: &str) -> Environment;
}

/// Ordered chain of endpoint resolvers.
#[derive(Default)]
pub struct EndpointResolverRegistry {
    resolvers: RwLock<Vec<Arc<dyn EndpointResolver>>>,
}

impl EndpointResolverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver ahead of all existing ones.
    ///
    /// A resolver with the same name is replaced.
    pub fn register(&self, resolver: Arc<dyn EndpointResolver>) {
        let mut resolvers = self.resolvers.write();
        resolvers.retain(|r| r.name() != resolver.name());
        tracing::debug!(resolver = resolver.name(), "Registering endpoint resolver");
        resolvers.insert(0, resolver);
    }

    /// Removes the resolver with the given name.
    pub fn unregister(&self, name: &str) -> bool {
        let mut resolvers = self.resolvers.write();
        let before = resolvers.len();
        resolvers.retain(|r| r.name() != name);
        resolvers.len() != before
    }

    /// Returns the number of registered resolvers.
    pub fn len(&self) -> usize {
        self.resolvers.read().len()
    }

    /// Returns true if no resolver is registered.
    pub fn is_empty(&self) -> bool {
        self.resolvers.read().is_empty()
    }
}

impl EndpointResolver for EndpointResolverRegistry {
    fn name(&self) -> &str {
        "endpoint-resolver-registry"
    }

    fn resolve(&self, service: &str, environment: &Environment) -> Option<Endpoint> {
        self.resolvers
            .read()
            .iter()
            .find_map(|r| r.resolve(service, environment))
    }
}

impl std::fmt::Debug for EndpointResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .resolvers
            .read()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        f.debug_struct("EndpointResolverRegistry")
            .field("resolvers", &names)
            .finish()
    }
}

/// Ordered chain of environment resolvers.
#[derive(Default)]
pub struct EnvironmentResolverRegistry {
    resolvers: RwLock<Vec<Arc<dyn EnvironmentResolver>>>,
}

impl EnvironmentResolverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resolver ahead of all existing ones.
    pub fn register(&self, resolver: Arc<dyn EnvironmentResolver>) {
        let mut resolvers = self.resolvers.write();
        resolvers.retain(|r| r.name() != resolver.name());
        tracing::debug!(resolver = resolver.name(), "Registering environment resolver");
        resolvers.insert(0, resolver);
    }

    /// Removes the resolver with the given name.
    pub fn unregister(&self, name: &str) -> bool {
        let mut resolvers = self.resolvers.write();
        let before = resolvers.len();
        resolvers.retain(|r| r.name() != name);
        resolvers.len() != before
    }

    /// Returns the number of registered resolvers.
    pub fn len(&self) -> usize {
        self.resolvers.read().len()
    }

    /// Returns true if no resolver is registered.
    pub fn is_empty(&self) -> bool {
        self.resolvers.read().is_empty()
    }
}

impl EnvironmentResolver for EnvironmentResolverRegistry {
    fn name(&self) -> &str {
        "environment-resolver-registry"
    }

    fn resolve(&self, service: &str) -> Environment {
        self.resolvers
            .read()
            .iter()
            .map(|r| r.resolve(service))
            .find(|env| !env.is_default())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for EnvironmentResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentResolverRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// In-memory endpoint table.
///
/// An entry registered under [`Environment::Default`] answers for every
/// environment that has no entry of its own.
#[derive(Debug, Default)]
pub struct StaticEndpointResolver {
    name: String,
    endpoints: RwLock<HashMap<(String, Environment), Endpoint>>,
}

impl StaticEndpointResolver {
    /// Creates an empty resolver.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Adds an endpoint with its own configuration.
    pub fn with_endpoint(
        self,
        service: impl Into<String>,
        environment: impl Into<Environment>,
        endpoint: Endpoint,
    ) -> Self {
        self.insert(service, environment, endpoint);
        self
    }

    /// Adds an endpoint with the default configuration.
    pub fn with_uri(
        self,
        service: impl Into<String>,
        environment: impl Into<Environment>,
        uri: impl Into<String>,
    ) -> Self {
        self.with_endpoint(service, environment, Endpoint::new(uri, Configuration::default()))
    }

    /// Adds or replaces an endpoint.
    pub fn insert(
        &self,
        service: impl Into<String>,
        environment: impl Into<Environment>,
        endpoint: Endpoint,
    ) {
        self.endpoints
            .write()
            .insert((service.into(), environment.into()), endpoint);
    }

    /// Removes an endpoint.
    pub fn remove(&self, service: &str, environment: &Environment) -> Option<Endpoint> {
        self.endpoints
            .write()
            .remove(&(service.to_string(), environment.clone()))
    }
}

impl EndpointResolver for StaticEndpointResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, service: &str, environment: &Environment) -> Option<Endpoint> {
        let endpoints = self.endpoints.read();
        endpoints
            .get(&(service.to_string(), environment.clone()))
            .or_else(|| endpoints.get(&(service.to_string(), Environment::Default)))
            .cloned()
    }
}

/// Environment resolver returning a fixed environment per service.
#[derive(Debug, Default)]
pub struct StaticEnvironmentResolver {
    name: String,
    environments: HashMap<String, Environment>,
    fallback: Environment,
}

impl StaticEnvironmentResolver {
    /// Creates a resolver that has no opinion for any service.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environments: HashMap::new(),
            fallback: Environment::Default,
        }
    }

    /// Pins the environment of one service.
    pub fn with_service(
        mut self,
        service: impl Into<String>,
        environment: impl Into<Environment>,
    ) -> Self {
        self.environments.insert(service.into(), environment.into());
        self
    }

    /// Sets the environment returned for unlisted services.
    pub fn with_fallback(mut self, environment: impl Into<Environment>) -> Self {
        self.fallback = environment.into();
        self
    }
}

impl EnvironmentResolver for StaticEnvironmentResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&self, service: &str) -> Environment {
        self.environments
            .get(service)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_resolver_exact_and_default_match() {
        let resolver = StaticEndpointResolver::new("static")
            .with_uri("orders", "qa", "http://orders.qa")
            .with_uri("orders", Environment::Default, "http://orders.prod");

        assert_eq!(
            resolver.resolve("orders", &Environment::named("qa")).map(|e| e.uri),
            Some("http://orders.qa".to_string())
        );
        assert_eq!(
            resolver.resolve("orders", &Environment::named("perf")).map(|e| e.uri),
            Some("http://orders.prod".to_string())
        );
        assert!(resolver.resolve("billing", &Environment::Default).is_none());
    }

    #[test]
    fn test_endpoint_registry_latest_resolver_wins() {
        let registry = EndpointResolverRegistry::new();
        registry.register(Arc::new(
            StaticEndpointResolver::new("first").with_uri(
                "orders",
                Environment::Default,
                "http://first",
            ),
        ));
        registry.register(Arc::new(
            StaticEndpointResolver::new("second").with_uri(
                "orders",
                Environment::Default,
                "http://second",
            ),
        ));

        let endpoint = registry.resolve("orders", &Environment::Default).unwrap();
        assert_eq!(endpoint.uri, "http://second");

        assert!(registry.unregister("second"));
        let endpoint = registry.resolve("orders", &Environment::Default).unwrap();
        assert_eq!(endpoint.uri, "http://first");
        assert!(!registry.unregister("second"));
    }

    #[test]
    fn test_endpoint_registry_replaces_same_name() {
        let registry = EndpointResolverRegistry::new();
        registry.register(Arc::new(StaticEndpointResolver::new("static")));
        registry.register(Arc::new(StaticEndpointResolver::new("static")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_environment_registry_skips_default_answers() {
        let registry = EnvironmentResolverRegistry::new();
        registry.register(Arc::new(
            StaticEnvironmentResolver::new("pinned").with_service("orders", "qa"),
        ));
        registry.register(Arc::new(StaticEnvironmentResolver::new("no-opinion")));

        assert_eq!(registry.resolve("orders"), Environment::named("qa"));
        assert_eq!(registry.resolve("billing"), Environment::Default);
    }
}
