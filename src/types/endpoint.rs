//! Resolved network endpoint.

use crate::config::Configuration;
use crate::errors::ServiceResult;

/// Resolved network address plus policy configuration for a service.
///
/// Endpoints are immutable; reconfiguration replaces the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// Base URI of the service.
    pub uri: String,
    /// Policy configuration applied to calls against this endpoint.
    pub config: Configuration,
}

impl Endpoint {
    /// Creates an endpoint with the given configuration.
    pub fn new(uri: impl Into<String>, config: Configuration) -> Self {
        Self {
            uri: uri.into().trim_end_matches('/').to_string(),
            config,
        }
    }

    /// Creates an endpoint with the default configuration.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self::new(uri, Configuration::default())
    }

    /// Creates an endpoint after validating the URI.
    pub fn parse(uri: &str, config: Configuration) -> ServiceResult<Self> {
        url::Url::parse(uri)?;
        Ok(Self::new(uri, config))
    }

    /// Returns a copy of this endpoint with a different configuration.
    pub fn with_config(&self, config: Configuration) -> Self {
        Self {
            uri: self.uri.clone(),
            config,
        }
    }

    /// Returns the full URL for a path relative to this endpoint.
    pub fn url_for(&self, path: &str) -> String {
        if path.is_empty() {
            return self.uri.clone();
        }
        format!("{}/{}", self.uri, path.trim_start_matches('/'))
    }
}
