//! Cross-platform advertising trait and platform detection
//!
//! Each shim only submits an already-encoded [`AdvertisementRecord`] to the
//! host Bluetooth stack and adapts its completion signal into a future. The
//! byte layout lives in `ibeacon-core` so every platform puts the same bytes
//! on air.

pub mod fallback;
#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod simulated;

use ibeacon_core::{AdvertisementRecord, Result as BeaconResult};

use crate::config::AdvertiserConfig;
use crate::protocol::AdvertiseSettings;

pub use fallback::FallbackAdvertiser;
pub use simulated::{RadioProbe, SimulatedOutcome, SimulatedRadio};

// ----------------------------------------------------------------------------
// Cross-platform Advertising Trait
// ----------------------------------------------------------------------------

/// Thin wrapper around one platform's peripheral advertising API
#[async_trait::async_trait]
pub trait BeaconAdvertiser: Send + Sync {
    /// Submit the record and wait for the stack to confirm or reject it
    async fn start_advertising(
        &mut self,
        record: &AdvertisementRecord,
        settings: &AdvertiseSettings,
    ) -> BeaconResult<()>;

    /// Withdraw the current broadcast and wait for the stack to acknowledge
    async fn stop_advertising(&mut self) -> BeaconResult<()>;

    /// Check if currently advertising
    fn is_advertising(&self) -> bool;

    /// Short platform label for logs
    fn platform_name(&self) -> &'static str;
}

// ----------------------------------------------------------------------------
// Platform Detection and Factory
// ----------------------------------------------------------------------------

/// Platform-specific advertiser enum
pub enum PlatformAdvertiser {
    #[cfg(target_os = "linux")]
    Linux(linux::LinuxAdvertiser),
    #[cfg(target_os = "macos")]
    MacOS(macos::MacOSAdvertiser),
    Simulated(SimulatedRadio),
    #[allow(dead_code)]
    Fallback(FallbackAdvertiser),
}

impl PlatformAdvertiser {
    /// Create the appropriate advertiser for the current platform
    pub fn new(config: &AdvertiserConfig) -> Self {
        #[cfg(target_os = "linux")]
        {
            Self::Linux(linux::LinuxAdvertiser::new(config))
        }
        #[cfg(target_os = "macos")]
        {
            let _ = config;
            Self::MacOS(macos::MacOSAdvertiser::new())
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let _ = config;
            Self::Fallback(FallbackAdvertiser::new())
        }
    }

    /// Use an in-process radio instead of the host stack
    pub fn simulated(radio: SimulatedRadio) -> Self {
        Self::Simulated(radio)
    }
}

#[async_trait::async_trait]
impl BeaconAdvertiser for PlatformAdvertiser {
    async fn start_advertising(
        &mut self,
        record: &AdvertisementRecord,
        settings: &AdvertiseSettings,
    ) -> BeaconResult<()> {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref mut advertiser) => advertiser.start_advertising(record, settings).await,
            #[cfg(target_os = "macos")]
            Self::MacOS(ref mut advertiser) => advertiser.start_advertising(record, settings).await,
            Self::Simulated(ref mut radio) => radio.start_advertising(record, settings).await,
            Self::Fallback(ref mut advertiser) => {
                advertiser.start_advertising(record, settings).await
            }
        }
    }

    async fn stop_advertising(&mut self) -> BeaconResult<()> {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref mut advertiser) => advertiser.stop_advertising().await,
            #[cfg(target_os = "macos")]
            Self::MacOS(ref mut advertiser) => advertiser.stop_advertising().await,
            Self::Simulated(ref mut radio) => radio.stop_advertising().await,
            Self::Fallback(ref mut advertiser) => advertiser.stop_advertising().await,
        }
    }

    fn is_advertising(&self) -> bool {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref advertiser) => advertiser.is_advertising(),
            #[cfg(target_os = "macos")]
            Self::MacOS(ref advertiser) => advertiser.is_advertising(),
            Self::Simulated(ref radio) => radio.is_advertising(),
            Self::Fallback(ref advertiser) => advertiser.is_advertising(),
        }
    }

    fn platform_name(&self) -> &'static str {
        match self {
            #[cfg(target_os = "linux")]
            Self::Linux(ref advertiser) => advertiser.platform_name(),
            #[cfg(target_os = "macos")]
            Self::MacOS(ref advertiser) => advertiser.platform_name(),
            Self::Simulated(ref radio) => radio.platform_name(),
            Self::Fallback(ref advertiser) => advertiser.platform_name(),
        }
    }
}
