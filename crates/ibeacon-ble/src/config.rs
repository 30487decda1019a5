//! Advertiser and scanner configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::{AdvertiseMode, AdvertiseSettings, TxPowerLevel};

// ----------------------------------------------------------------------------
// Advertiser Configuration
// ----------------------------------------------------------------------------

/// Configuration for an advertising session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvertiserConfig {
    /// Advertising interval preset
    pub mode: AdvertiseMode,
    /// Radio output power preset
    pub tx_power_level: TxPowerLevel,
    /// How long to wait for the stack to confirm a start
    pub start_timeout_ms: u64,
    /// Adapter to use instead of the default one (Linux only)
    pub adapter_name: Option<String>,
    /// Power the adapter on instead of failing when it is off (Linux only)
    pub power_on_adapter: bool,
}

impl Default for AdvertiserConfig {
    fn default() -> Self {
        Self {
            mode: AdvertiseMode::LowLatency,
            tx_power_level: TxPowerLevel::High,
            start_timeout_ms: 10_000,
            adapter_name: None,
            power_on_adapter: false,
        }
    }
}

impl AdvertiserConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set advertising mode
    pub fn with_mode(mut self, mode: AdvertiseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set radio power level
    pub fn with_tx_power_level(mut self, level: TxPowerLevel) -> Self {
        self.tx_power_level = level;
        self
    }

    /// Set start timeout
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Use a named adapter
    pub fn with_adapter_name(mut self, name: impl Into<String>) -> Self {
        self.adapter_name = Some(name.into());
        self
    }

    /// Allow powering on the adapter
    pub fn with_power_on_adapter(mut self, enabled: bool) -> Self {
        self.power_on_adapter = enabled;
        self
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn settings(&self) -> AdvertiseSettings {
        AdvertiseSettings {
            mode: self.mode,
            tx_power_level: self.tx_power_level,
        }
    }
}

// ----------------------------------------------------------------------------
// Scanner Configuration
// ----------------------------------------------------------------------------

/// Configuration for the receiving-side scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Only report beacons with this proximity UUID
    pub uuid_filter: Option<Uuid>,
    /// Capacity of the sighting channel
    pub channel_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            uuid_filter: None,
            channel_capacity: 64,
        }
    }
}

impl ScannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uuid_filter(mut self, uuid: Uuid) -> Self {
        self.uuid_filter = Some(uuid);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = AdvertiserConfig::new()
            .with_mode(AdvertiseMode::Balanced)
            .with_tx_power_level(TxPowerLevel::Low)
            .with_start_timeout(Duration::from_secs(3))
            .with_adapter_name("hci1");

        assert_eq!(config.start_timeout(), Duration::from_secs(3));
        assert_eq!(config.adapter_name.as_deref(), Some("hci1"));
        assert_eq!(
            config.settings(),
            AdvertiseSettings {
                mode: AdvertiseMode::Balanced,
                tx_power_level: TxPowerLevel::Low,
            }
        );
    }

    #[test]
    fn test_partial_deserialization() {
        let config: AdvertiserConfig = serde_json::from_str(r#"{"mode":"low_power"}"#).unwrap();
        assert_eq!(config.mode, AdvertiseMode::LowPower);
        assert_eq!(config.start_timeout_ms, 10_000);
        assert!(!config.power_on_adapter);
    }
}
