//! Error types for the BLE layer

use std::time::Duration;

use ibeacon_core::{BeaconError, StateTransitionError};
use thiserror::Error;

use crate::protocol::failure_code;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors raised by the radio shims and the scanner before they are folded
/// into the shared [`BeaconError`] taxonomy
#[derive(Error, Debug)]
pub enum BleError {
    #[error("BLE adapter not available: {0}")]
    AdapterNotAvailable(String),

    #[error("BLE adapter is powered off")]
    AdapterPoweredOff,

    #[error("Peripheral role not supported: {0}")]
    PeripheralUnsupported(String),

    #[error("Bluetooth access not authorized: {0}")]
    NotAuthorized(String),

    #[error("Platform error {code}: {message}")]
    Platform { code: i32, message: String },

    #[error("No callback from the Bluetooth stack after {0:?}")]
    CallbackTimeout(Duration),

    #[error("A request is already waiting for the Bluetooth stack")]
    RequestPending,

    #[error("Bluetooth stack dropped the pending request")]
    CallbackDropped,

    #[error("Failed to scan: {0}")]
    ScanFailed(String),

    #[error("Session state error: {0}")]
    InvalidState(#[from] StateTransitionError),
}

pub type Result<T> = std::result::Result<T, BleError>;

impl From<BleError> for BeaconError {
    fn from(err: BleError) -> Self {
        match err {
            BleError::AdapterNotAvailable(reason) => BeaconError::radio_unavailable(reason),
            BleError::AdapterPoweredOff => BeaconError::radio_unavailable("adapter powered off"),
            BleError::PeripheralUnsupported(reason) => BeaconError::unsupported(reason),
            BleError::NotAuthorized(reason) => BeaconError::unauthorized(reason),
            BleError::Platform { code, message } => BeaconError::start_failed(code, message),
            BleError::CallbackTimeout(duration) => BeaconError::Timeout {
                duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            },
            BleError::RequestPending => BeaconError::Busy,
            BleError::CallbackDropped => BeaconError::start_failed(
                failure_code::INTERNAL_ERROR,
                "Bluetooth stack dropped the pending request",
            ),
            BleError::ScanFailed(reason) => {
                BeaconError::start_failed(failure_code::INTERNAL_ERROR, reason)
            }
            BleError::InvalidState(err) => {
                BeaconError::start_failed(failure_code::INTERNAL_ERROR, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibeacon_core::ErrorKind;

    #[test]
    fn test_conversion_to_taxonomy() {
        assert_eq!(
            BeaconError::from(BleError::AdapterPoweredOff).kind(),
            ErrorKind::RadioUnavailable
        );
        assert_eq!(
            BeaconError::from(BleError::NotAuthorized("denied".into())).kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            BeaconError::from(BleError::Platform {
                code: 2,
                message: "too many advertisers".into()
            }),
            BeaconError::start_failed(2, "too many advertisers")
        );
        assert_eq!(
            BeaconError::from(BleError::CallbackTimeout(Duration::from_millis(1500))),
            BeaconError::Timeout { duration_ms: 1500 }
        );
        assert_eq!(BeaconError::from(BleError::RequestPending), BeaconError::Busy);
        assert_eq!(
            BeaconError::from(BleError::PeripheralUnsupported("no peripheral role".into())).code(),
            "ADV_UNSUPPORTED"
        );
    }
}
