//! Advertising settings and manufacturer data helpers

use std::collections::BTreeMap;
use std::time::Duration;

use ibeacon_core::{AdvertisementRecord, APPLE_COMPANY_ID};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Advertising Settings
// ----------------------------------------------------------------------------

/// Trade-off between discovery latency and battery use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvertiseMode {
    /// ~100 ms interval
    #[default]
    LowLatency,
    /// ~250 ms interval
    Balanced,
    /// ~1 s interval
    LowPower,
}

impl AdvertiseMode {
    pub fn interval(&self) -> Duration {
        match self {
            AdvertiseMode::LowLatency => Duration::from_millis(100),
            AdvertiseMode::Balanced => Duration::from_millis(250),
            AdvertiseMode::LowPower => Duration::from_millis(1000),
        }
    }
}

/// Radio output power requested from the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxPowerLevel {
    #[default]
    High,
    Medium,
    Low,
    UltraLow,
}

impl TxPowerLevel {
    /// Nominal output power in dBm
    pub fn dbm(&self) -> i16 {
        match self {
            TxPowerLevel::High => 1,
            TxPowerLevel::Medium => -7,
            TxPowerLevel::Low => -15,
            TxPowerLevel::UltraLow => -21,
        }
    }
}

/// Settings handed to a platform advertiser together with the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdvertiseSettings {
    pub mode: AdvertiseMode,
    pub tx_power_level: TxPowerLevel,
}

impl AdvertiseSettings {
    /// Beacons never accept connections
    pub fn connectable(&self) -> bool {
        false
    }
}

// ----------------------------------------------------------------------------
// Platform Failure Codes
// ----------------------------------------------------------------------------

/// Status codes reported with [`ibeacon_core::BeaconError::StartFailed`]
///
/// Values follow the Android `AdvertiseCallback` constants so logs from
/// every platform read the same.
pub mod failure_code {
    pub const DATA_TOO_LARGE: i32 = 1;
    pub const ALREADY_STARTED: i32 = 3;
    pub const INTERNAL_ERROR: i32 = 4;
}

// ----------------------------------------------------------------------------
// Manufacturer Data
// ----------------------------------------------------------------------------

/// Manufacturer data map keyed by company identifier (BlueZ style)
pub fn manufacturer_data_map(record: &AdvertisementRecord) -> BTreeMap<u16, Vec<u8>> {
    let (company_id, payload) = record.manufacturer_data();
    let mut map = BTreeMap::new();
    map.insert(company_id, payload);
    map
}

/// Manufacturer data value with the little-endian company identifier in
/// front (CoreBluetooth style)
pub fn manufacturer_payload_with_company_id(record: &AdvertisementRecord) -> Vec<u8> {
    let mut payload = Vec::with_capacity(2 + record.as_bytes().len());
    payload.extend_from_slice(&APPLE_COMPANY_ID.to_le_bytes());
    payload.extend_from_slice(record.as_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibeacon_core::{encode, AdvertisingTuning, BeaconIdentity};

    #[test]
    fn test_manufacturer_data_map() {
        let record = encode(&BeaconIdentity::default(), &AdvertisingTuning::default());
        let map = manufacturer_data_map(&record);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&0x004C), Some(&record.to_vec()));
    }

    #[test]
    fn test_company_id_prefix() {
        let record = encode(&BeaconIdentity::default(), &AdvertisingTuning::default());
        let payload = manufacturer_payload_with_company_id(&record);
        assert_eq!(payload.len(), 25);
        assert_eq!(&payload[..4], &[0x4C, 0x00, 0x02, 0x15]);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = AdvertiseSettings::default();
        assert_eq!(settings.mode.interval(), Duration::from_millis(100));
        assert_eq!(settings.tx_power_level.dbm(), 1);
        assert!(!settings.connectable());
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&AdvertiseMode::LowPower).unwrap();
        assert_eq!(json, "\"low_power\"");
        let level: TxPowerLevel = serde_json::from_str("\"ultra_low\"").unwrap();
        assert_eq!(level, TxPowerLevel::UltraLow);
    }
}
