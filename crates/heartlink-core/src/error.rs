//! Error types for heartlink-core.
//!
//! What a failure does depends on where it happens, not on its variant.
//! The state machine reports errors to observers through
//! [`CentralEvent::Error`](crate::events::CentralEvent::Error); operations
//! invoked directly also return them.
//!
//! | Raised by | Effect |
//! |-----------|--------|
//! | Any privileged call, as [`Error::PermissionDenied`] | Nothing happens, no status change |
//! | `connect` on a busy machine, as [`Error::InvalidState`] | Rejected, current session untouched |
//! | `connect` refused by the transport | Stays [`ConnectionStatus::Disconnected`], no handle held |
//! | `start_scan` / `stop_scan` refused by the transport | Scan flag cleared, connection untouched |
//! | A GATT step during a session ([`Error::GattStatus`], [`Error::ServiceNotFound`], [`Error::CharacteristicNotFound`], [`Error::Transport`]) | Session torn down |
//! | [`Error::LinkLost`] | Session torn down, no reconnect |
//! | [`Error::Decode`] | Payload dropped, session keeps streaming |

use std::time::Duration;

use thiserror::Error;

use heartlink_types::{ConnectionStatus, ParseError};

use crate::permission::Permission;
use crate::transport::GattStatus;

/// Errors that can occur while scanning for or talking to a heart-rate peripheral.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A privileged operation was attempted without the required grant.
    #[error("Permission denied: {0}")]
    PermissionDenied(Permission),

    /// The operation is not valid in the current connection status.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// The rejected operation.
        operation: &'static str,
        /// Status at the time of the call.
        state: ConnectionStatus,
    },

    /// Bluetooth Low Energy error from btleplug.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// The transport rejected a request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport reported a non-success GATT status.
    #[error("GATT operation '{operation}' failed with {status}")]
    GattStatus {
        /// The GATT step that failed.
        operation: &'static str,
        /// The status reported by the transport.
        status: GattStatus,
    },

    /// The Heart Rate service is absent from the peripheral.
    #[error("Service not found: {uuid} (searched {service_count} services)")]
    ServiceNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// The Heart Rate Measurement characteristic is absent from its service.
    #[error("Characteristic not found: {uuid} in service {service}")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// The service that was searched.
        service: String,
    },

    /// The link dropped asynchronously.
    #[error("Link to {address} lost")]
    LinkLost {
        /// Address of the peripheral whose link dropped.
        address: String,
    },

    /// No peripheral with the given address is known to the transport.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// No Bluetooth adapter is available.
    #[error("No Bluetooth adapter available")]
    NoAdapter,

    /// A notification payload could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] ParseError),

    /// A transport request did not complete in time.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The event loop is no longer running.
    #[error("Central event loop has stopped")]
    ChannelClosed,
}

impl Error {
    /// Create an invalid state error.
    pub fn invalid_state(operation: &'static str, state: ConnectionStatus) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create a transport error from any displayable reason.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport(reason.into())
    }

    /// Create a GATT status error.
    pub fn gatt(operation: &'static str, status: GattStatus) -> Self {
        Self::GattStatus { operation, status }
    }

    /// Create a service not found error.
    pub fn service_not_found(uuid: impl ToString, service_count: usize) -> Self {
        Self::ServiceNotFound {
            uuid: uuid.to_string(),
            service_count,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl ToString, service: impl ToString) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.to_string(),
            service: service.to_string(),
        }
    }

    /// Create a link lost error.
    pub fn link_lost(address: impl Into<String>) -> Self {
        Self::LinkLost {
            address: address.into(),
        }
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using heartlink-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PermissionDenied(Permission::Scan);
        assert_eq!(err.to_string(), "Permission denied: scan");

        let err = Error::invalid_state("connect", ConnectionStatus::Connecting);
        assert_eq!(err.to_string(), "Cannot connect while connecting");

        let err = Error::service_not_found(heartlink_types::uuid::HEART_RATE_SERVICE, 3);
        assert!(err.to_string().contains("0000180d"));
        assert!(err.to_string().contains("3 services"));

        let err = Error::link_lost("AA:BB:CC:DD:EE:FF");
        assert_eq!(err.to_string(), "Link to AA:BB:CC:DD:EE:FF lost");

        let err = Error::timeout("connect", Duration::from_secs(15));
        assert!(err.to_string().contains("15s"));
    }

    #[test]
    fn test_gatt_status_display() {
        let err = Error::gatt("discover services", GattStatus::Failure(133));
        assert_eq!(
            err.to_string(),
            "GATT operation 'discover services' failed with status 133"
        );
    }

    #[test]
    fn test_parse_error_conversion() {
        let parse = ParseError::InsufficientBytes {
            expected: 3,
            actual: 1,
        };
        let err: Error = parse.into();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.to_string().contains("requires 3 bytes"));
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
