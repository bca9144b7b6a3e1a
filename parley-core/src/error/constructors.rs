//! Constructor helpers for ParleyError

use std::net::SocketAddr;

use super::types::ParleyError;

impl ParleyError {
    /// Create a configuration error with component and message
    ///
    /// # Examples
    /// ```rust
    /// use parley_core::error::ParleyError;
    ///
    /// let err = ParleyError::configuration("timing.heartbeat_timeout", "must exceed the interval");
    /// assert!(err.to_string().contains("timing.heartbeat_timeout"));
    /// ```
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        ParleyError::ConfigurationError {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error for a rejected value
    pub fn invalid_config<T: std::fmt::Display>(field: &str, value: T, reason: &str) -> Self {
        ParleyError::ConfigurationError {
            component: field.to_string(),
            message: format!("Invalid value '{}': {}", value, reason),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        ParleyError::Decode {
            reason: reason.into(),
        }
    }

    pub fn send_failure<E: std::fmt::Display>(address: SocketAddr, source: E) -> Self {
        ParleyError::SendFailure {
            address,
            details: source.to_string(),
        }
    }

    /// Create a protocol violation for a message the current role does not handle
    pub fn protocol_violation(
        message_type: &'static str,
        role: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        ParleyError::ProtocolViolation {
            message_type,
            role: role.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_coordinator(operation: &str) -> Self {
        ParleyError::NotCoordinator {
            operation: operation.to_string(),
        }
    }

    pub fn unknown_peer(name: &str) -> Self {
        ParleyError::UnknownPeer {
            name: name.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ParleyError::Internal {
            message: message.into(),
        }
    }
}
