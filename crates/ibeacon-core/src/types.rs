//! Beacon identity, tuning and session handle types

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EncodeError;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Bluetooth SIG company identifier assigned to Apple
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// iBeacon subtype byte
pub const IBEACON_TYPE: u8 = 0x02;

/// Length of the iBeacon body following the two prefix bytes
pub const IBEACON_DATA_LENGTH: u8 = 0x15;

/// Total size of an encoded advertisement record
pub const RECORD_LEN: usize = 23;

/// Typical RSSI at 1 meter for a phone transmitting at high power
pub const DEFAULT_TX_POWER: i8 = -59;

/// Proximity UUID the vehicle is provisioned to look for
pub const DEFAULT_UUID: Uuid = Uuid::from_u128(0xfda50693_a4e2_4fb1_afcf_c6eb07647825);

pub const DEFAULT_MAJOR: u16 = 100;

pub const DEFAULT_MINOR: u16 = 1;

// ----------------------------------------------------------------------------
// Beacon Identity
// ----------------------------------------------------------------------------

/// Who the beacon claims to be: proximity UUID plus major/minor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeaconIdentity {
    pub uuid: Uuid,
    pub major: u16,
    pub minor: u16,
}

impl BeaconIdentity {
    pub const fn new(uuid: Uuid, major: u16, minor: u16) -> Self {
        Self { uuid, major, minor }
    }

    /// Validate loosely-typed input (as received from a UI or config layer)
    pub fn parse(uuid: &str, major: i64, minor: i64) -> Result<Self, EncodeError> {
        let uuid = parse_uuid(uuid)?;
        let major = check_u16("major", major)?;
        let minor = check_u16("minor", minor)?;
        Ok(Self { uuid, major, minor })
    }
}

impl Default for BeaconIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_UUID, DEFAULT_MAJOR, DEFAULT_MINOR)
    }
}

impl fmt::Display for BeaconIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} major={} minor={}", self.uuid, self.major, self.minor)
    }
}

// ----------------------------------------------------------------------------
// Advertising Tuning
// ----------------------------------------------------------------------------

/// Calibration data receivers use for distance estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdvertisingTuning {
    /// Expected RSSI in dBm at 1 meter
    pub calibrated_tx_power: i8,
}

impl AdvertisingTuning {
    pub const fn new(calibrated_tx_power: i8) -> Self {
        Self {
            calibrated_tx_power,
        }
    }

    pub fn parse(tx_power: i64) -> Result<Self, EncodeError> {
        let value = i8::try_from(tx_power).map_err(|_| EncodeError::OutOfRange {
            field: "txPower",
            value: tx_power,
            min: i8::MIN as i64,
            max: i8::MAX as i64,
        })?;
        Ok(Self::new(value))
    }
}

impl Default for AdvertisingTuning {
    fn default() -> Self {
        Self::new(DEFAULT_TX_POWER)
    }
}

// ----------------------------------------------------------------------------
// Session Handle
// ----------------------------------------------------------------------------

/// Identifies one successful start of an advertising session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionHandle(u64);

impl SessionHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Input Validation
// ----------------------------------------------------------------------------

/// Parse the canonical 8-4-4-4-12 form only
///
/// `Uuid::parse_str` also accepts simple, braced and URN forms; the mobile
/// bridges never did, so neither do we.
fn parse_uuid(input: &str) -> Result<Uuid, EncodeError> {
    let invalid = || EncodeError::InvalidUuid {
        input: input.to_string(),
    };

    if input.len() != 36 {
        return Err(invalid());
    }
    let groups: Vec<&str> = input.split('-').collect();
    let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
    if lengths != [8, 4, 4, 4, 12] {
        return Err(invalid());
    }

    Uuid::parse_str(input).map_err(|_| invalid())
}

fn check_u16(field: &'static str, value: i64) -> Result<u16, EncodeError> {
    u16::try_from(value).map_err(|_| EncodeError::OutOfRange {
        field,
        value,
        min: 0,
        max: u16::MAX as i64,
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
