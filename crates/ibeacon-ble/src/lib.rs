//! Bluetooth Low Energy side of the iBeacon transmitter
//!
//! This crate turns an encoded [`AdvertisementRecord`](ibeacon_core::AdvertisementRecord)
//! into a live broadcast and back.
//!
//! ## Architecture
//!
//! - [`advertising`] - Platform shims behind the [`BeaconAdvertiser`] trait
//! - [`session`] - Session controller owning one advertiser and its state
//! - [`pending`] - Single-slot holder that turns stack callbacks into futures
//! - [`permissions`] - Runtime permission matrix and gates
//! - [`scanner`] - Central-role listener decoding iBeacon frames
//! - [`config`] - Advertiser and scanner configuration
//! - [`protocol`] - Advertising settings and manufacturer data helpers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ibeacon_ble::{AdvertiserConfig, BeaconController, PlatformAdvertiser};
//!
//! # async fn example() -> Result<(), ibeacon_core::BeaconError> {
//! let config = AdvertiserConfig::new();
//! let controller = BeaconController::with_advertiser(PlatformAdvertiser::new(&config), &config);
//!
//! let message = controller
//!     .start_beacon("fda50693-a4e2-4fb1-afcf-c6eb07647825", 100, 1, -59)
//!     .await?;
//! assert_eq!(message, "iBeacon advertising started");
//!
//! controller.stop_beacon().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! - **Linux**: BlueZ broadcast advertisements via `bluer`
//! - **macOS**: `CBPeripheralManager` through Objective-C bindings
//! - **Other platforms**: every start fails with `Unsupported`
//!
//! Scanning uses btleplug on every platform it supports.

pub mod advertising;
pub mod config;
pub mod error;
pub mod pending;
pub mod permissions;
pub mod protocol;
pub mod scanner;
pub mod session;

// Public API exports
pub use advertising::{
    BeaconAdvertiser, FallbackAdvertiser, PlatformAdvertiser, RadioProbe, SimulatedOutcome,
    SimulatedRadio,
};
pub use config::{AdvertiserConfig, ScannerConfig};
pub use error::BleError;
pub use pending::{PendingRequest, PendingSlot, PendingToken};
pub use permissions::{
    required_permissions, Permission, PermissionGate, Platform, PolicyPermissionGate,
    StaticPermissionGate,
};
pub use protocol::{AdvertiseMode, AdvertiseSettings, TxPowerLevel};
pub use scanner::{sighting_from_manufacturer_data, BeaconScanner, BeaconSighting};
pub use session::{AdvertisingSession, BeaconController, STARTED_MESSAGE, STOPPED_MESSAGE};
