//! Client registry.
//!
//! The [`ServiceRegistry`] caches one [`ServiceClient`] per
//! (service name, environment) key, creating clients on first lookup from
//! the configured resolvers and replacing them when breaker-relevant
//! configuration changes.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::client::ServiceClient;
use crate::config::Configuration;
use crate::errors::{ServiceError, ServiceResult};
use crate::observability::{
    DefaultMetricsCollector, MetricsCollector, RegistryInfo, RegistryMetrics, RegistryMonitor,
    TracingMonitor,
};
use crate::pipeline::{DefaultPipelineBuilder, PipelineBuilder, RequestExecutor};
use crate::resolver::{EndpointResolver, EnvironmentResolver, EnvironmentResolverRegistry};
use crate::services::ServiceCaller;
use crate::transport::{HttpTransport, HttpTransportImpl};
use crate::types::{Environment, RawResponse};

/// Name used when the builder is given none.
pub const DEFAULT_REGISTRY_NAME: &str = "service-registry";

type ClientKey = (String, Environment);

/// Cache of service clients keyed by (name, environment).
pub struct ServiceRegistry {
    name: String,
    clients: DashMap<ClientKey, Arc<ServiceClient>>,
    endpoint_resolver: Arc<dyn EndpointResolver>,
    environment_resolver: Arc<dyn EnvironmentResolver>,
    pipeline: Arc<dyn PipelineBuilder>,
    executor: Arc<RequestExecutor>,
    metrics: Arc<dyn MetricsCollector>,
}

impl ServiceRegistry {
    /// Creates a new registry builder.
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::new()
    }

    /// Returns the registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the client for `name` in `environment`, creating it if needed.
    ///
    /// [`Environment::Default`] is first resolved through the environment
    /// resolver. The cache is consulted under the resolved environment, then
    /// under the requested one; a newly created client is stored under the
    /// requested environment.
    ///
    /// The endpoint resolver runs outside any cache lock. Concurrent first
    /// lookups may each resolve, but only one client is stored and all of
    /// them return it.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::EndpointNotFound`] if no endpoint resolves.
    #[instrument(skip(self), fields(registry = %self.name))]
    pub fn get(
        &self,
        name: &str,
        environment: &Environment,
    ) -> ServiceResult<Arc<ServiceClient>> {
        let resolved = if environment.is_default() {
            self.environment_resolver.resolve(name)
        } else {
            environment.clone()
        };

        if let Some(client) = self.cached(name, &resolved) {
            return Ok(client);
        }
        if &resolved != environment {
            if let Some(client) = self.cached(name, environment) {
                return Ok(client);
            }
        }

        let client = Arc::new(self.create_client(name, &resolved, environment)?);
        let entry = self
            .clients
            .entry((name.to_string(), environment.clone()))
            .or_insert(client);
        Ok(Arc::clone(entry.value()))
    }

    fn cached(&self, name: &str, environment: &Environment) -> Option<Arc<ServiceClient>> {
        self.clients
            .get(&(name.to_string(), environment.clone()))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Reconfigures a client.
    ///
    /// When the breaker parameters are unchanged the endpoint is replaced in
    /// place and the same client is returned. Otherwise a new client with a
    /// new breaker replaces it in the registry; holders of the old client
    /// keep a working but unregistered instance.
    #[instrument(
        skip(self, client, config),
        fields(service = %client.name(), environment = %client.environment())
    )]
    pub fn with_config(
        &self,
        client: &Arc<ServiceClient>,
        config: Configuration,
    ) -> Arc<ServiceClient> {
        let current = client.endpoint();
        let key = (client.name().to_string(), client.environment().clone());

        if current
            .config
            .circuit_breaker
            .same_breaker_params(&config.circuit_breaker)
        {
            client.set_endpoint(current.with_config(config));
            self.clients.insert(key, Arc::clone(client));
            return Arc::clone(client);
        }

        tracing::info!("Breaker parameters changed, replacing client");
        let replacement = Arc::new(ServiceClient::with_status(
            client.name(),
            client.environment().clone(),
            current.with_config(config),
            client.status(),
        ));
        self.clients.insert(key, Arc::clone(&replacement));
        replacement
    }

    /// Sets the fallback response of a client in place.
    #[instrument(
        skip(self, client, response),
        fields(service = %client.name(), status = response.status)
    )]
    pub fn with_fallback(
        &self,
        client: &Arc<ServiceClient>,
        response: RawResponse,
    ) -> Arc<ServiceClient> {
        let current = client.endpoint();
        client.set_endpoint(current.with_config(current.config.with_fallback(response)));
        self.clients.insert(
            (client.name().to_string(), client.environment().clone()),
            Arc::clone(client),
        );
        Arc::clone(client)
    }

    /// Marks a client down, creating it first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::EndpointNotFound`] if no endpoint resolves.
    pub fn mark_down(&self, name: &str, environment: &Environment) -> ServiceResult<()> {
        self.get(name, environment)?.mark_down();
        Ok(())
    }

    /// Marks a client up, creating it first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::EndpointNotFound`] if no endpoint resolves.
    pub fn mark_up(&self, name: &str, environment: &Environment) -> ServiceResult<()> {
        self.get(name, environment)?.mark_up();
        Ok(())
    }

    /// Returns a caller bound to the client for `name` in `environment`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::EndpointNotFound`] if no endpoint resolves.
    pub fn caller(&self, name: &str, environment: &Environment) -> ServiceResult<ServiceCaller> {
        let client = self.get(name, environment)?;
        Ok(self.caller_for(client))
    }

    /// Returns a caller bound to an existing client.
    pub fn caller_for(&self, client: Arc<ServiceClient>) -> ServiceCaller {
        ServiceCaller::new(client, Arc::clone(&self.pipeline), Arc::clone(&self.executor))
    }

    /// Removes the client stored under the given key.
    pub fn remove(&self, name: &str, environment: &Environment) -> Option<Arc<ServiceClient>> {
        self.clients
            .remove(&(name.to_string(), environment.clone()))
            .map(|(_, client)| client)
    }

    /// Removes every client.
    pub fn clear(&self) {
        self.clients.clear();
    }

    /// Returns the number of cached clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no client is cached.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Returns the cache keys.
    pub fn keys(&self) -> Vec<(String, Environment)> {
        self.clients.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns a metrics snapshot.
    pub fn metrics(&self) -> RegistryMetrics {
        self.metrics.get_metrics()
    }

    /// Builds a client in `resolved`; failures report the `requested` environment.
    fn create_client(
        &self,
        name: &str,
        resolved: &Environment,
        requested: &Environment,
    ) -> ServiceResult<ServiceClient> {
        let endpoint = self.endpoint_resolver.resolve(name, resolved).ok_or_else(|| {
            tracing::warn!(service = %name, environment = %resolved, "No endpoint resolved");
            ServiceError::endpoint_not_found(name, requested.clone())
        })?;
        Ok(ServiceClient::new(name, resolved.clone(), endpoint))
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("name", &self.name)
            .field("clients", &self.clients.len())
            .field("endpoint_resolver", &self.endpoint_resolver.name())
            .field("environment_resolver", &self.environment_resolver.name())
            .finish()
    }
}

/// Builder for [`ServiceRegistry`].
pub struct ServiceRegistryBuilder {
    name: String,
    endpoint_resolver: Option<Arc<dyn EndpointResolver>>,
    environment_resolver: Option<Arc<dyn EnvironmentResolver>>,
    pipeline: Option<Arc<dyn PipelineBuilder>>,
    transport: Option<Arc<dyn HttpTransport>>,
    metrics: Option<Arc<dyn MetricsCollector>>,
    monitor: Option<Arc<dyn RegistryMonitor>>,
}

impl ServiceRegistryBuilder {
    /// Creates a new registry builder.
    pub fn new() -> Self {
        Self {
            name: DEFAULT_REGISTRY_NAME.to_string(),
            endpoint_resolver: None,
            environment_resolver: None,
            pipeline: None,
            transport: None,
            metrics: None,
            monitor: None,
        }
    }

    /// Sets the registry name reported to the monitor.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the endpoint resolver.
    pub fn endpoint_resolver(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.endpoint_resolver = Some(resolver);
        self
    }

    /// Sets the environment resolver.
    pub fn environment_resolver(mut self, resolver: Arc<dyn EnvironmentResolver>) -> Self {
        self.environment_resolver = Some(resolver);
        self
    }

    /// Sets a custom pipeline builder.
    pub fn pipeline(mut self, pipeline: Arc<dyn PipelineBuilder>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Sets the transport used by the default pipeline builder.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets a custom metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the monitor notified when the registry is built.
    pub fn monitor(mut self, monitor: Arc<dyn RegistryMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Builds the registry and registers it with the monitor.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Configuration`] if no endpoint resolver was
    /// set, or if the default transport cannot be created.
    pub fn build(self) -> ServiceResult<ServiceRegistry> {
        let endpoint_resolver = self
            .endpoint_resolver
            .ok_or_else(|| ServiceError::configuration("endpoint resolver is required"))?;

        let environment_resolver: Arc<dyn EnvironmentResolver> = self
            .environment_resolver
            .unwrap_or_else(|| Arc::new(EnvironmentResolverRegistry::new()));

        let pipeline: Arc<dyn PipelineBuilder> = match (self.pipeline, self.transport) {
            (Some(pipeline), _) => pipeline,
            (None, Some(transport)) => Arc::new(DefaultPipelineBuilder::new(transport)),
            (None, None) => {
                let transport = HttpTransportImpl::with_defaults().map_err(|e| {
                    ServiceError::configuration(format!("failed to create transport: {e}"))
                })?;
                Arc::new(DefaultPipelineBuilder::new(Arc::new(transport)))
            }
        };

        let metrics: Arc<dyn MetricsCollector> = self
            .metrics
            .unwrap_or_else(|| Arc::new(DefaultMetricsCollector::new()));
        let monitor: Arc<dyn RegistryMonitor> =
            self.monitor.unwrap_or_else(|| Arc::new(TracingMonitor));

        let registry = ServiceRegistry {
            name: self.name,
            clients: DashMap::new(),
            endpoint_resolver,
            environment_resolver,
            pipeline,
            executor: Arc::new(RequestExecutor::new(Arc::clone(&metrics))),
            metrics,
        };

        monitor.register(&RegistryInfo {
            name: registry.name.clone(),
            endpoint_resolver: registry.endpoint_resolver.name().to_string(),
            environment_resolver: registry.environment_resolver.name().to_string(),
        });

        Ok(registry)
    }
}

impl Default for ServiceRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
