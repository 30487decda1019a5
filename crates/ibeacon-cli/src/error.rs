//! Error handling for the iBeacon shell

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Beacon(#[from] ibeacon_core::BeaconError),

    #[error("Invalid beacon parameters: {0}")]
    Encode(#[from] ibeacon_core::EncodeError),

    #[error("Cannot decode record: {0}")]
    Decode(#[from] ibeacon_core::DecodeError),

    #[error("BLE error: {0}")]
    Ble(#[from] ibeacon_ble::BleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bluetooth permissions denied after {attempts} attempt(s)")]
    PermissionDenied { attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Hex decoding error: {0}")]
    HexDecoding(#[from] hex::FromHexError),

    #[error("{0}")]
    Other(String),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::Other(err.to_string())
    }
}
