//! iBeacon Core Implementation
//!
//! This crate provides the platform-independent pieces of an iBeacon
//! transmitter: the identity and tuning types, the fixed 23-byte
//! advertisement record encoder (and its receiver-side decoder), the error
//! taxonomy shared by every platform shim, and the advertising session state
//! machine. It performs no I/O.
//!
//! ## Record layout
//!
//! ```text
//! 0x02 0x15 | uuid (16, big-endian) | major (2, BE) | minor (2, BE) | tx power (1, i8)
//! ```
//!
//! The record is broadcast as manufacturer-specific data under Apple's
//! company identifier [`APPLE_COMPANY_ID`].
//!
//! ## Usage
//!
//! ```rust
//! use ibeacon_core::{encode_raw, APPLE_COMPANY_ID};
//!
//! let record = encode_raw("fda50693-a4e2-4fb1-afcf-c6eb07647825", 100, 1, -59).unwrap();
//! assert_eq!(record.as_bytes().len(), 23);
//!
//! let (company_id, payload) = record.manufacturer_data();
//! assert_eq!(company_id, APPLE_COMPANY_ID);
//! assert_eq!(payload[22], 0xC5);
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod errors;
pub mod proximity;
pub mod record;
pub mod session_state;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use errors::{BeaconError, DecodeError, EncodeError, ErrorKind};
pub use proximity::{estimate_distance, Proximity};
pub use record::{encode, encode_raw, parse_manufacturer_data, AdvertisementRecord};
pub use session_state::{SessionEvent, SessionState, StateTransitionError};
pub use types::{
    AdvertisingTuning, BeaconIdentity, SessionHandle, APPLE_COMPANY_ID, DEFAULT_MAJOR,
    DEFAULT_MINOR, DEFAULT_TX_POWER, DEFAULT_UUID, IBEACON_DATA_LENGTH, IBEACON_TYPE, RECORD_LEN,
};

pub type Result<T> = core::result::Result<T, BeaconError>;
