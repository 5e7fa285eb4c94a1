//! Core data types shared across the registry.

mod endpoint;
mod environment;
mod response;

pub use endpoint::Endpoint;
pub use environment::Environment;
pub use response::{RawResponse, ResponseWrapper, TypedResponseWrapper};

/// Administrative liveness of a client.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Calls may be attempted.
    Up = 0,
    /// Calls short-circuit before reaching the breaker.
    Down = 1,
}

impl From<u8> for ClientStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => ClientStatus::Down,
            _ => ClientStatus::Up,
        }
    }
}
