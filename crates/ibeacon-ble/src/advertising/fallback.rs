//! Fallback advertising implementation for unsupported platforms

use ibeacon_core::{AdvertisementRecord, BeaconError, Result as BeaconResult};
use tracing::warn;

use crate::protocol::AdvertiseSettings;

use super::BeaconAdvertiser;

// ----------------------------------------------------------------------------
// Fallback Implementation
// ----------------------------------------------------------------------------

/// Advertiser for hosts without a supported peripheral API
///
/// Every start is rejected with [`BeaconError::Unsupported`] so the caller
/// learns immediately that nothing is on air.
#[derive(Debug, Default)]
pub struct FallbackAdvertiser;

impl FallbackAdvertiser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl BeaconAdvertiser for FallbackAdvertiser {
    async fn start_advertising(
        &mut self,
        record: &AdvertisementRecord,
        _settings: &AdvertiseSettings,
    ) -> BeaconResult<()> {
        warn!(
            "BLE advertising not supported on this platform; beacon {} will not be broadcast. \
            Use Linux with BlueZ or macOS.",
            record.identity()
        );
        Err(BeaconError::unsupported(
            "BLE advertising not supported on this platform",
        ))
    }

    async fn stop_advertising(&mut self) -> BeaconResult<()> {
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        false
    }

    fn platform_name(&self) -> &'static str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibeacon_core::{encode, AdvertisingTuning, BeaconIdentity, ErrorKind};

    #[tokio::test]
    async fn test_start_is_unsupported() {
        let mut advertiser = FallbackAdvertiser::new();
        let record = encode(&BeaconIdentity::default(), &AdvertisingTuning::default());

        let err = advertiser
            .start_advertising(&record, &AdvertiseSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(!advertiser.is_advertising());
        assert!(advertiser.stop_advertising().await.is_ok());
    }
}
