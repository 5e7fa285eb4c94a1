//! Marshalling capabilities for request and response bodies.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{ServiceError, ServiceResult};
use crate::types::RawResponse;

/// Converts a typed value into a request body.
pub trait Marshaller<T: ?Sized>: Send + Sync {
    /// Content type of the produced body.
    fn content_type(&self) -> &str;

    /// Serializes `value`.
    fn marshal(&self, value: &T) -> ServiceResult<Vec<u8>>;
}

/// Converts a response body into a typed value.
pub trait Unmarshaller<T>: Send + Sync {
    /// Deserializes the body of `response`.
    fn unmarshal(&self, response: &RawResponse) -> ServiceResult<T>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + ?Sized> Marshaller<T> for JsonCodec {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn marshal(&self, value: &T) -> ServiceResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| ServiceError::Marshal {
            message: e.to_string(),
        })
    }
}

impl<T: DeserializeOwned> Unmarshaller<T> for JsonCodec {
    fn unmarshal(&self, response: &RawResponse) -> ServiceResult<T> {
        serde_json::from_slice(&response.body).map_err(|e| ServiceError::Unmarshal {
            message: e.to_string(),
        })
    }
}

/// Plain-text codec for `String` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Marshaller<str> for TextCodec {
    fn content_type(&self) -> &str {
        "text/plain; charset=utf-8"
    }

    fn marshal(&self, value: &str) -> ServiceResult<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }
}

impl Unmarshaller<String> for TextCodec {
    fn unmarshal(&self, response: &RawResponse) -> ServiceResult<String> {
        String::from_utf8(response.body.clone()).map_err(|e| ServiceError::Unmarshal {
            message: e.to_string(),
        })
    }
}
