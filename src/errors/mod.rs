//! Error types for the service registry.
//!
//! Covers every way a call can fail before, inside, or after the circuit
//! breaker: endpoint resolution, pre-flight pipeline failures, breaker
//! rejections and timeouts, transport failures, and typed-body conversion.

use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;
use crate::types::{Environment, RawResponse};

/// Result type alias for registry operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Status code reported when a client has been marked down.
pub const MARK_DOWN_ERROR_CODE: u16 = 998;

/// Status code reported for any other pre-flight pipeline failure.
pub const PIPELINE_ERROR_CODE: u16 = 999;

/// Error type for service registry operations.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// No endpoint could be resolved for the service.
    #[error("No endpoint found for service '{name}' in environment '{environment}'")]
    EndpointNotFound {
        /// Logical service name.
        name: String,
        /// Environment that was requested.
        environment: Environment,
    },

    /// The client has been administratively marked down.
    #[error("Client '{name}' in environment '{environment}' is marked down")]
    ClientMarkedDown {
        /// Logical service name.
        name: String,
        /// Environment of the client.
        environment: Environment,
    },

    /// The request pipeline could not be built or run.
    #[error("Pipeline error: {message}")]
    Pipeline {
        /// Error message.
        message: String,
    },

    /// The circuit breaker rejected the call.
    #[error("Circuit breaker open for service '{name}'")]
    CircuitOpen {
        /// Logical service name.
        name: String,
    },

    /// The call exceeded the breaker's call timeout.
    #[error("Call timed out after {timeout:?}")]
    CallTimeout {
        /// Timeout that was exceeded.
        timeout: Duration,
    },

    /// The remote side answered with a non-success status.
    #[error("Unsuccessful response (HTTP {})", response.status)]
    UnsuccessfulResponse {
        /// The response that was received.
        response: RawResponse,
    },

    /// The response body could not be converted to the target type.
    #[error("Unmarshal error: {message}")]
    Unmarshal {
        /// Error message.
        message: String,
    },

    /// The request body could not be serialized.
    #[error("Marshal error: {message}")]
    Marshal {
        /// Error message.
        message: String,
    },

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message.
        message: String,
    },
}

impl ServiceError {
    /// Returns true if this error is detected before the breaker is consulted.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            ServiceError::ClientMarkedDown { .. } | ServiceError::Pipeline { .. }
        )
    }

    /// Status code used when this error short-circuits the pipeline.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::ClientMarkedDown { .. } => MARK_DOWN_ERROR_CODE,
            _ => PIPELINE_ERROR_CODE,
        }
    }

    /// Returns true if this error is a breaker-level failure that a
    /// configured fallback absorbs.
    pub fn is_breaker_failure(&self) -> bool {
        matches!(
            self,
            ServiceError::CircuitOpen { .. }
                | ServiceError::CallTimeout { .. }
                | ServiceError::Transport(_)
        )
    }

    /// Creates a pipeline error.
    pub fn pipeline(message: impl Into<String>) -> Self {
        ServiceError::Pipeline {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration {
            message: message.into(),
        }
    }

    /// Creates an endpoint-not-found error.
    pub fn endpoint_not_found(name: impl Into<String>, environment: Environment) -> Self {
        ServiceError::EndpointNotFound {
            name: name.into(),
            environment,
        }
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(err: url::ParseError) -> Self {
        ServiceError::Configuration {
            message: format!("Invalid URL: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_status_codes() {
        let down = ServiceError::ClientMarkedDown {
            name: "orders".to_string(),
            environment: Environment::Default,
        };
        assert!(down.is_preflight());
        assert_eq!(down.status_code(), MARK_DOWN_ERROR_CODE);

        let pipeline = ServiceError::pipeline("no connection");
        assert!(pipeline.is_preflight());
        assert_eq!(pipeline.status_code(), PIPELINE_ERROR_CODE);
    }

    #[test]
    fn test_breaker_failures() {
        assert!(ServiceError::CircuitOpen {
            name: "orders".to_string()
        }
        .is_breaker_failure());

        assert!(ServiceError::CallTimeout {
            timeout: Duration::from_millis(10)
        }
        .is_breaker_failure());

        assert!(!ServiceError::pipeline("boom").is_breaker_failure());
    }

    #[test]
    fn test_endpoint_not_found_message() {
        let error = ServiceError::endpoint_not_found("orders", Environment::named("qa"));
        let message = error.to_string();
        assert!(message.contains("orders"));
        assert!(message.contains("qa"));
    }

    #[test]
    fn test_url_parse_error_is_configuration() {
        let err = url::Url::parse("not a url").unwrap_err();
        assert!(matches!(
            ServiceError::from(err),
            ServiceError::Configuration { .. }
        ));
    }
}
