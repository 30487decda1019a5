//! Error types for iBeacon encoding and advertising
//!
//! [`EncodeError`] and [`DecodeError`] cover the pure record codec.
//! [`BeaconError`] is the taxonomy every advertising shim reports through, so
//! callers see the same kinds regardless of the host OS.

use thiserror::Error;

// ----------------------------------------------------------------------------
// Codec Errors
// ----------------------------------------------------------------------------

/// Input rejected before any bytes are produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Invalid UUID format: {input:?}")]
    InvalidUuid { input: String },

    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Bytes that are not a well-formed iBeacon record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Invalid record length: {actual} bytes (expected {expected})")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Not an iBeacon frame: prefix {prefix:02x?}")]
    NotIBeacon { prefix: [u8; 2] },

    #[error("Invalid hex input: {0}")]
    InvalidHex(String),
}

impl From<hex::FromHexError> for DecodeError {
    fn from(err: hex::FromHexError) -> Self {
        DecodeError::InvalidHex(err.to_string())
    }
}

// ----------------------------------------------------------------------------
// Advertising Error Taxonomy
// ----------------------------------------------------------------------------

/// Coarse classification of a [`BeaconError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    RadioUnavailable,
    Unsupported,
    Unauthorized,
    StartFailed,
    Timeout,
    Busy,
}

/// Errors surfaced by an advertising session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeaconError {
    #[error("Invalid beacon input: {0}")]
    InvalidInput(#[from] EncodeError),

    #[error("Bluetooth is not available or enabled: {reason}")]
    RadioUnavailable { reason: String },

    #[error("BLE advertising not supported: {reason}")]
    Unsupported { reason: String },

    #[error("Bluetooth access denied: {reason}")]
    Unauthorized { reason: String },

    #[error("Failed to start advertising (code {code}): {reason}")]
    StartFailed { code: i32, reason: String },

    #[error("Bluetooth stack did not respond within {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Another advertising request is still pending")]
    Busy,
}

impl BeaconError {
    /// Classification used for status reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            BeaconError::InvalidInput(_) => ErrorKind::InvalidInput,
            BeaconError::RadioUnavailable { .. } => ErrorKind::RadioUnavailable,
            BeaconError::Unsupported { .. } => ErrorKind::Unsupported,
            BeaconError::Unauthorized { .. } => ErrorKind::Unauthorized,
            BeaconError::StartFailed { .. } => ErrorKind::StartFailed,
            BeaconError::Timeout { .. } => ErrorKind::Timeout,
            BeaconError::Busy => ErrorKind::Busy,
        }
    }

    /// Stable machine-readable code, matching the mobile bridge rejection codes
    pub fn code(&self) -> &'static str {
        match self {
            BeaconError::InvalidInput(EncodeError::InvalidUuid { .. }) => "INVALID_UUID",
            BeaconError::InvalidInput(EncodeError::OutOfRange { .. }) => "OUT_OF_RANGE",
            BeaconError::RadioUnavailable { .. } => "BT_OFF",
            BeaconError::Unsupported { .. } => "ADV_UNSUPPORTED",
            BeaconError::Unauthorized { .. } => "BT_UNAUTHORIZED",
            BeaconError::StartFailed { .. } => "ADV_FAIL",
            BeaconError::Timeout { .. } => "ADV_TIMEOUT",
            BeaconError::Busy => "BUSY",
        }
    }

    pub fn radio_unavailable(reason: impl Into<String>) -> Self {
        BeaconError::RadioUnavailable {
            reason: reason.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        BeaconError::Unsupported {
            reason: reason.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        BeaconError::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn start_failed(code: i32, reason: impl Into<String>) -> Self {
        BeaconError::StartFailed {
            code,
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let invalid = BeaconError::from(EncodeError::InvalidUuid {
            input: "x".to_string(),
        });
        assert_eq!(invalid.code(), "INVALID_UUID");
        assert_eq!(invalid.kind(), ErrorKind::InvalidInput);

        let range = BeaconError::from(EncodeError::OutOfRange {
            field: "major",
            value: 70000,
            min: 0,
            max: 65535,
        });
        assert_eq!(range.code(), "OUT_OF_RANGE");

        assert_eq!(BeaconError::radio_unavailable("off").code(), "BT_OFF");
        assert_eq!(BeaconError::start_failed(3, "busy").kind(), ErrorKind::StartFailed);
    }

    #[test]
    fn test_error_messages() {
        let err = EncodeError::OutOfRange {
            field: "minor",
            value: -1,
            min: 0,
            max: 65535,
        };
        assert_eq!(err.to_string(), "minor out of range: -1 (allowed 0..=65535)");

        let err = BeaconError::start_failed(2, "too many advertisers");
        assert_eq!(
            err.to_string(),
            "Failed to start advertising (code 2): too many advertisers"
        );
    }
}
