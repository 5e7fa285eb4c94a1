//! Response envelopes.

use std::collections::HashMap;

use crate::errors::ServiceError;

/// Raw response as returned by the transport or configured as a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Creates a response with the given status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Creates a JSON response from a serializable value.
    pub fn json<T: serde::Serialize>(status: u16, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status, body).with_header("content-type", "application/json"))
    }

    /// Sets a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns true if the status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body as lossy UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Uniform envelope around the outcome of a raw call.
#[derive(Debug, Clone)]
pub struct ResponseWrapper {
    /// Status code of the response, or a sentinel for local failures.
    pub status_code: u16,
    /// The response, or the error that prevented one.
    pub body: Result<RawResponse, ServiceError>,
}

impl ResponseWrapper {
    /// Wraps a received response.
    pub fn from_response(response: RawResponse) -> Self {
        Self {
            status_code: response.status,
            body: Ok(response),
        }
    }

    /// Wraps a local failure.
    pub fn from_error(status_code: u16, error: ServiceError) -> Self {
        Self {
            status_code,
            body: Err(error),
        }
    }

    /// Returns true if a response with a 2xx status was received.
    pub fn is_success(&self) -> bool {
        matches!(&self.body, Ok(r) if r.is_success())
    }
}

/// Uniform envelope around the outcome of a typed call.
#[derive(Debug, Clone)]
pub struct TypedResponseWrapper<T> {
    /// Status code of the response, or a sentinel for local failures.
    pub status_code: u16,
    /// The converted body, or the error that prevented conversion.
    pub value: Result<T, ServiceError>,
    /// The raw response the value was taken from, if any.
    pub raw_response: Option<RawResponse>,
}

impl<T> TypedResponseWrapper<T> {
    /// Wraps a local failure that produced no response.
    pub fn from_error(status_code: u16, error: ServiceError) -> Self {
        Self {
            status_code,
            value: Err(error),
            raw_response: None,
        }
    }

    /// Returns the converted value if there is one.
    pub fn ok(self) -> Option<T> {
        self.value.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_response_success_range() {
        assert!(RawResponse::new(200, "{}").is_success());
        assert!(RawResponse::new(204, Vec::new()).is_success());
        assert!(!RawResponse::new(404, "missing").is_success());
        assert!(!RawResponse::new(503, "down").is_success());
    }

    #[test]
    fn test_json_response_sets_content_type() {
        let response = RawResponse::json(200, &serde_json::json!({"id": 1})).unwrap();
        assert_eq!(
            response.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(response.text(), r#"{"id":1}"#);
    }

    #[test]
    fn test_wrapper_from_response() {
        let wrapper = ResponseWrapper::from_response(RawResponse::new(201, "created"));
        assert_eq!(wrapper.status_code, 201);
        assert!(wrapper.is_success());
    }
}
