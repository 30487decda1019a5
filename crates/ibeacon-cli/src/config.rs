//! iBeacon shell configuration
//!
//! Layered with figment, lowest priority first:
//! - built-in defaults (the fixed vehicle beacon identity)
//! - `ibeacon.toml` in the working directory
//! - `<config dir>/ibeacon/ibeacon.toml` (via `dirs`)
//! - environment variables prefixed with `IBEACON_`, nested with `__`
//!   (for example `IBEACON_BEACON__MAJOR=7`)
//!
//! An explicit `--config` file replaces the two file layers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use ibeacon_ble::{AdvertiserConfig, ScannerConfig};
use ibeacon_core::{
    encode_raw, AdvertisementRecord, EncodeError, DEFAULT_MAJOR, DEFAULT_MINOR, DEFAULT_TX_POWER,
    DEFAULT_UUID,
};
use serde::{Deserialize, Serialize};

use crate::cli::BeaconArgs;

const CONFIG_FILE_NAME: &str = "ibeacon.toml";
const ENV_PREFIX: &str = "IBEACON_";

// ----------------------------------------------------------------------------
// Configuration Types
// ----------------------------------------------------------------------------

/// Complete configuration for the shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ShellConfig {
    /// What to broadcast
    pub beacon: BeaconConfig,

    /// Radio settings for the advertising session
    pub advertiser: AdvertiserConfig,

    /// Launch and retry behaviour
    pub shell: ShellSettings,

    /// Receiving-side scanner settings
    pub scanner: ScannerConfig,
}

/// Beacon fields as given by the user, validated by the encoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    pub uuid: String,
    pub major: i64,
    pub minor: i64,
    pub tx_power: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    /// Pause between the permission grant and the first start
    pub startup_delay_ms: u64,
    /// Pause before every further attempt
    pub retry_delay_ms: u64,
    /// Permission and start attempts before giving up
    pub max_attempts: u32,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            uuid: DEFAULT_UUID.to_string(),
            major: i64::from(DEFAULT_MAJOR),
            minor: i64::from(DEFAULT_MINOR),
            tx_power: i64::from(DEFAULT_TX_POWER),
        }
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            startup_delay_ms: 1500,
            retry_delay_ms: 1000,
            max_attempts: 3,
        }
    }
}

impl BeaconConfig {
    /// Replace fields given on the command line
    pub fn with_overrides(mut self, args: &BeaconArgs) -> Self {
        if let Some(uuid) = &args.uuid {
            self.uuid = uuid.clone();
        }
        if let Some(major) = args.major {
            self.major = major;
        }
        if let Some(minor) = args.minor {
            self.minor = minor;
        }
        if let Some(tx_power) = args.tx_power {
            self.tx_power = tx_power;
        }
        self
    }

    pub fn record(&self) -> Result<AdvertisementRecord, EncodeError> {
        encode_raw(&self.uuid, self.major, self.minor, self.tx_power)
    }
}

impl ShellSettings {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl ShellConfig {
    /// Load from the standard file locations and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE_NAME));
        if let Some(path) = Self::default_config_path() {
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load from a specific file, still honouring the environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::FileSystem(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: ShellConfig = figment
            .extract()
            .map_err(|e| ConfigError::Loading(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/ibeacon/ibeacon.toml`, when the platform has a config dir
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ibeacon").join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.beacon
            .record()
            .map_err(|e| ConfigError::Validation(format!("beacon: {}", e)))?;

        if self.shell.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "shell.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.advertiser.start_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "advertiser.start_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.scanner.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "scanner.channel_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&ShellConfig::default())
            .unwrap_or_else(|e| format!("# Failed to generate example config: {}\n", e))
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("File system error: {0}")]
    FileSystem(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use ibeacon_ble::AdvertiseMode;

    #[test]
    fn test_default_config() {
        let config = ShellConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.beacon.uuid, "fda50693-a4e2-4fb1-afcf-c6eb07647825");
        assert_eq!(config.shell.startup_delay(), Duration::from_millis(1500));
        assert_eq!(config.shell.retry_delay(), Duration::from_millis(1000));
        assert_eq!(config.shell.max_attempts, 3);
        assert_eq!(
            config.beacon.record().unwrap().to_string(),
            "0215fda50693a4e24fb1afcfc6eb0764782500640001c5"
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = ShellConfig::default();
        config.beacon.major = 70_000;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ShellConfig::default();
        config.shell.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = ShellConfig::default();
        config.beacon.uuid = "not-a-uuid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let args = BeaconArgs {
            uuid: None,
            major: Some(5),
            minor: None,
            tx_power: Some(-70),
        };
        let beacon = BeaconConfig::default().with_overrides(&args);
        assert_eq!(beacon.major, 5);
        assert_eq!(beacon.minor, 1);
        assert_eq!(beacon.tx_power, -70);
    }

    #[test]
    fn test_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [beacon]
                major = 42

                [advertiser]
                mode = "balanced"
                "#,
            )?;
            jail.set_env("IBEACON_BEACON__MINOR", "9");

            let config = ShellConfig::load_from_file("custom.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.beacon.major, 42);
            assert_eq!(config.beacon.minor, 9);
            assert_eq!(config.advertiser.mode, AdvertiseMode::Balanced);
            assert_eq!(config.shell.max_attempts, 3);
            Ok(())
        });
    }

    #[test]
    fn test_working_directory_file() {
        Jail::expect_with(|jail| {
            jail.create_file("ibeacon.toml", "[shell]\nmax_attempts = 5\n")?;
            let config = ShellConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.shell.max_attempts, 5);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[beacon]\ntx_power = 200\n")?;
            let result = ShellConfig::load_from_file("bad.toml");
            assert!(matches!(result, Err(ConfigError::Validation(_))));
            Ok(())
        });
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ShellConfig::load_from_file("/nonexistent/ibeacon.toml"),
            Err(ConfigError::FileSystem(_))
        ));
    }

    #[test]
    fn test_example_config_generation() {
        let example = ShellConfig::example_config();
        assert!(example.contains("[beacon]"));
        assert!(example.contains("[advertiser]"));
        assert!(example.contains("[shell]"));

        let parsed: ShellConfig = toml::from_str(&example).unwrap();
        assert_eq!(parsed, ShellConfig::default());
    }
}
