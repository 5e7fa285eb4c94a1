//! Configuration module for service clients.
//!
//! Provides per-endpoint policy configuration: circuit breaker thresholds
//! and timeouts, an optional fallback response, and transport defaults.

use std::time::Duration;

use crate::errors::{ServiceError, ServiceResult};
use crate::types::RawResponse;

/// Default number of consecutive failures before the breaker opens.
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// Default deadline for a single call attempted through the breaker.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time the breaker stays open before admitting a trial call.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

/// Circuit breaker settings for an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerSettings {
    /// Consecutive failures before opening.
    pub max_failures: u32,
    /// Maximum duration of a single call before it counts as a failure.
    pub call_timeout: Duration,
    /// Duration to stay open before trialing a call.
    pub reset_timeout: Duration,
    /// Response substituted for breaker-level failures.
    pub fallback_response: Option<RawResponse>,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            fallback_response: None,
        }
    }
}

impl CircuitBreakerSettings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    pub fn max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    /// Sets the call timeout.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets the reset timeout.
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Sets the fallback response.
    pub fn fallback(mut self, response: RawResponse) -> Self {
        self.fallback_response = Some(response);
        self
    }

    /// Returns true if both settings would build an identical breaker.
    ///
    /// The fallback response is not a breaker parameter.
    pub fn same_breaker_params(&self, other: &CircuitBreakerSettings) -> bool {
        self.max_failures == other.max_failures
            && self.call_timeout == other.call_timeout
            && self.reset_timeout == other.reset_timeout
    }
}

/// Policy configuration attached to an endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Configuration {
    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerSettings,
    /// Transport-level timeout applied to each request.
    pub request_timeout: Option<Duration>,
    /// Headers added to every request.
    pub default_headers: Vec<(String, String)>,
}

impl Configuration {
    /// Creates a new configuration builder.
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SERVICE_REGISTRY_MAX_FAILURES` (optional): breaker failure threshold
    /// - `SERVICE_REGISTRY_CALL_TIMEOUT_MS` (optional): breaker call timeout
    /// - `SERVICE_REGISTRY_RESET_TIMEOUT_MS` (optional): breaker reset timeout
    /// - `SERVICE_REGISTRY_REQUEST_TIMEOUT_MS` (optional): transport timeout
    pub fn from_env() -> ServiceResult<Self> {
        let mut builder = ConfigurationBuilder::new();

        if let Some(max_failures) = env_number::<u32>("SERVICE_REGISTRY_MAX_FAILURES")? {
            builder = builder.max_failures(max_failures);
        }
        if let Some(ms) = env_number::<u64>("SERVICE_REGISTRY_CALL_TIMEOUT_MS")? {
            builder = builder.call_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = env_number::<u64>("SERVICE_REGISTRY_RESET_TIMEOUT_MS")? {
            builder = builder.reset_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = env_number::<u64>("SERVICE_REGISTRY_REQUEST_TIMEOUT_MS")? {
            builder = builder.request_timeout(Duration::from_millis(ms));
        }

        builder.build()
    }

    /// Returns a copy of this configuration with the given fallback response.
    pub fn with_fallback(&self, response: RawResponse) -> Self {
        let mut config = self.clone();
        config.circuit_breaker.fallback_response = Some(response);
        config
    }

    /// Returns the configured fallback response, if any.
    pub fn fallback_response(&self) -> Option<&RawResponse> {
        self.circuit_breaker.fallback_response.as_ref()
    }
}

fn env_number<T: std::str::FromStr>(var: &str) -> ServiceResult<Option<T>> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| {
                ServiceError::configuration(format!("{} is not a valid number: {}", var, value))
            }),
        Err(_) => Ok(None),
    }
}

/// Builder for `Configuration`.
#[derive(Debug, Default)]
pub struct ConfigurationBuilder {
    circuit_breaker: CircuitBreakerSettings,
    request_timeout: Option<Duration>,
    default_headers: Vec<(String, String)>,
}

impl ConfigurationBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the circuit breaker settings.
    pub fn circuit_breaker(mut self, settings: CircuitBreakerSettings) -> Self {
        self.circuit_breaker = settings;
        self
    }

    /// Sets the breaker failure threshold.
    pub fn max_failures(mut self, max_failures: u32) -> Self {
        self.circuit_breaker.max_failures = max_failures;
        self
    }

    /// Sets the breaker call timeout.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.circuit_breaker.call_timeout = timeout;
        self
    }

    /// Sets the breaker reset timeout.
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.circuit_breaker.reset_timeout = timeout;
        self
    }

    /// Sets the fallback response.
    pub fn fallback(mut self, response: RawResponse) -> Self {
        self.circuit_breaker.fallback_response = Some(response);
        self
    }

    /// Sets the transport request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ServiceResult<Configuration> {
        if self.circuit_breaker.max_failures == 0 {
            return Err(ServiceError::configuration(
                "max_failures must be at least 1",
            ));
        }
        if self.circuit_breaker.call_timeout.is_zero() {
            return Err(ServiceError::configuration("call_timeout must be non-zero"));
        }

        Ok(Configuration {
            circuit_breaker: self.circuit_breaker,
            request_timeout: self.request_timeout,
            default_headers: self.default_headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = Configuration::builder().build().unwrap();

        assert_eq!(config.circuit_breaker.max_failures, DEFAULT_MAX_FAILURES);
        assert_eq!(config.circuit_breaker.call_timeout, DEFAULT_CALL_TIMEOUT);
        assert_eq!(config.circuit_breaker.reset_timeout, DEFAULT_RESET_TIMEOUT);
        assert!(config.fallback_response().is_none());
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_builder_rejects_zero_failures() {
        let result = Configuration::builder().max_failures(0).build();
        assert!(matches!(result, Err(ServiceError::Configuration { .. })));
    }

    #[test]
    fn test_builder_rejects_zero_call_timeout() {
        let result = Configuration::builder().call_timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_same_breaker_params_ignores_fallback() {
        let base = CircuitBreakerSettings::new().max_failures(3);
        let with_fallback = base.clone().fallback(RawResponse::new(200, "{}"));
        assert!(base.same_breaker_params(&with_fallback));

        let different = base.clone().reset_timeout(Duration::from_secs(5));
        assert!(!base.same_breaker_params(&different));
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("SERVICE_REGISTRY_MAX_FAILURES", "3");
        std::env::set_var("SERVICE_REGISTRY_CALL_TIMEOUT_MS", "250");
        let config = Configuration::from_env().unwrap();
        assert_eq!(config.circuit_breaker.max_failures, 3);
        assert_eq!(config.circuit_breaker.call_timeout, Duration::from_millis(250));
        assert_eq!(config.circuit_breaker.reset_timeout, DEFAULT_RESET_TIMEOUT);

        std::env::set_var("SERVICE_REGISTRY_MAX_FAILURES", "many");
        assert!(matches!(
            Configuration::from_env(),
            Err(ServiceError::Configuration { .. })
        ));

        std::env::remove_var("SERVICE_REGISTRY_MAX_FAILURES");
        std::env::remove_var("SERVICE_REGISTRY_CALL_TIMEOUT_MS");
    }

    #[test]
    fn test_with_fallback_keeps_other_fields() {
        let config = Configuration::builder()
            .max_failures(3)
            .header("x-team", "orders")
            .build()
            .unwrap();

        let updated = config.with_fallback(RawResponse::new(200, "{}"));
        assert_eq!(updated.circuit_breaker.max_failures, 3);
        assert_eq!(updated.default_headers, config.default_headers);
        assert_eq!(updated.fallback_response().map(|r| r.status), Some(200));
    }
}
