//! Process-wide monitoring registration.

/// Description of a registry handed to the monitor at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryInfo {
    /// Registry name.
    pub name: String,
    /// Names of the endpoint resolvers consulted by the registry.
    pub endpoint_resolver: String,
    /// Name of the environment resolver consulted by the registry.
    pub environment_resolver: String,
}

/// Receives the one-time registration of a registry.
///
/// Registration is fire-and-forget; the registry never calls back into the
/// monitor afterwards.
pub trait RegistryMonitor: Send + Sync {
    /// Registers `info`.
    fn register(&self, info: &RegistryInfo);
}

/// Monitor that logs the registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitor;

impl RegistryMonitor for TracingMonitor {
    fn register(&self, info: &RegistryInfo) {
        tracing::info!(
            registry = %info.name,
            endpoint_resolver = %info.endpoint_resolver,
            environment_resolver = %info.environment_resolver,
            "Service registry registered"
        );
    }
}
