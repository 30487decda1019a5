//! Receiving-side iBeacon scanner
//!
//! Listens in the central role with btleplug and decodes every Apple
//! manufacturer data entry that carries an iBeacon frame. Used to check a
//! broadcast from a second host.

use std::collections::HashMap;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use futures::StreamExt;
use ibeacon_core::{
    estimate_distance, parse_manufacturer_data, AdvertisingTuning, BeaconIdentity, Proximity,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::config::ScannerConfig;
use crate::error::{BleError, Result};

// ----------------------------------------------------------------------------
// Sightings
// ----------------------------------------------------------------------------

/// One decoded iBeacon frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeaconSighting {
    pub identity: BeaconIdentity,
    pub tuning: AdvertisingTuning,
    pub rssi: Option<i16>,
    /// Estimated distance in meters
    pub distance: Option<f64>,
    pub proximity: Proximity,
}

/// Decode a manufacturer data entry into a sighting
///
/// Entries from other manufacturers, Apple frames that are not iBeacons and
/// beacons outside `uuid_filter` all yield `None`.
pub fn sighting_from_manufacturer_data(
    company_id: u16,
    data: &[u8],
    rssi: Option<i16>,
    uuid_filter: Option<Uuid>,
) -> Option<BeaconSighting> {
    let record = match parse_manufacturer_data(company_id, data) {
        Ok(Some(record)) => record,
        Ok(None) => return None,
        Err(err) => {
            trace!("Skipping manufacturer data from 0x{:04X}: {}", company_id, err);
            return None;
        }
    };

    let identity = record.identity();
    if uuid_filter.is_some_and(|uuid| uuid != identity.uuid) {
        return None;
    }

    let tuning = record.tuning();
    let distance = rssi.and_then(|rssi| estimate_distance(tuning.calibrated_tx_power, rssi));
    let proximity = distance
        .map(Proximity::from_distance)
        .unwrap_or(Proximity::Unknown);

    Some(BeaconSighting {
        identity,
        tuning,
        rssi,
        distance,
        proximity,
    })
}

// ----------------------------------------------------------------------------
// Scanner
// ----------------------------------------------------------------------------

pub struct BeaconScanner {
    config: ScannerConfig,
    adapter: Option<Adapter>,
    task: Option<JoinHandle<()>>,
}

impl BeaconScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            config,
            adapter: None,
            task: None,
        }
    }

    /// Pick the first BLE adapter
    pub async fn initialize_adapter(&mut self) -> Result<()> {
        let manager = Manager::new()
            .await
            .map_err(|e| BleError::AdapterNotAvailable(format!("BLE manager: {}", e)))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| BleError::AdapterNotAvailable(format!("BLE adapters: {}", e)))?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| BleError::AdapterNotAvailable("no BLE adapters found".to_string()))?;

        self.adapter = Some(adapter);
        info!("BLE adapter initialized for scanning");
        Ok(())
    }

    /// Start scanning and stream decoded sightings
    pub async fn start(&mut self) -> Result<mpsc::Receiver<BeaconSighting>> {
        if self.adapter.is_none() {
            self.initialize_adapter().await?;
        }
        let adapter = self
            .adapter
            .clone()
            .ok_or_else(|| BleError::AdapterNotAvailable("adapter not initialized".to_string()))?;

        let mut events = adapter
            .events()
            .await
            .map_err(|e| BleError::ScanFailed(format!("event stream: {}", e)))?;

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| BleError::ScanFailed(e.to_string()))?;
        info!("Started scanning for iBeacon frames");

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let uuid_filter = self.config.uuid_filter;

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let CentralEvent::ManufacturerDataAdvertisement {
                    id,
                    manufacturer_data,
                } = event
                else {
                    continue;
                };

                let rssi = match adapter.peripheral(&id).await {
                    Ok(peripheral) => peripheral
                        .properties()
                        .await
                        .ok()
                        .flatten()
                        .and_then(|properties| properties.rssi),
                    Err(_) => None,
                };

                for sighting in decode_all(&manufacturer_data, rssi, uuid_filter) {
                    debug!("Sighted {} (rssi {:?})", sighting.identity, sighting.rssi);
                    if tx.send(sighting).await.is_err() {
                        debug!("Sighting receiver dropped; ending scan task");
                        return;
                    }
                }
            }
        });

        self.task = Some(task);
        Ok(rx)
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(adapter) = &self.adapter {
            adapter
                .stop_scan()
                .await
                .map_err(|e| BleError::ScanFailed(format!("stop scan: {}", e)))?;
            info!("Stopped scanning");
        }
        Ok(())
    }
}

impl Drop for BeaconScanner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn decode_all(
    manufacturer_data: &HashMap<u16, Vec<u8>>,
    rssi: Option<i16>,
    uuid_filter: Option<Uuid>,
) -> Vec<BeaconSighting> {
    manufacturer_data
        .iter()
        .filter_map(|(company_id, data)| {
            sighting_from_manufacturer_data(*company_id, data, rssi, uuid_filter)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibeacon_core::{encode, APPLE_COMPANY_ID};

    fn create_test_payload() -> Vec<u8> {
        encode(&BeaconIdentity::default(), &AdvertisingTuning::default()).to_vec()
    }

    #[test]
    fn test_sighting_from_apple_data() {
        let sighting =
            sighting_from_manufacturer_data(APPLE_COMPANY_ID, &create_test_payload(), Some(-59), None)
                .unwrap();

        assert_eq!(sighting.identity, BeaconIdentity::default());
        assert_eq!(sighting.tuning.calibrated_tx_power, -59);
        assert!((sighting.distance.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(sighting.proximity, Proximity::Near);
    }

    #[test]
    fn test_unknown_rssi_has_no_distance() {
        let sighting =
            sighting_from_manufacturer_data(APPLE_COMPANY_ID, &create_test_payload(), None, None)
                .unwrap();
        assert_eq!(sighting.distance, None);
        assert_eq!(sighting.proximity, Proximity::Unknown);
    }

    #[test]
    fn test_foreign_and_non_beacon_frames_are_skipped() {
        let payload = create_test_payload();
        assert!(sighting_from_manufacturer_data(0x0059, &payload, Some(-60), None).is_none());

        // Apple "nearby" frame
        let nearby = [0x10, 0x05, 0x01, 0x18, 0x00, 0x00, 0x00];
        assert!(sighting_from_manufacturer_data(APPLE_COMPANY_ID, &nearby, Some(-60), None).is_none());
    }

    #[test]
    fn test_uuid_filter() {
        let payload = create_test_payload();
        let other = Uuid::from_u128(1);
        assert!(
            sighting_from_manufacturer_data(APPLE_COMPANY_ID, &payload, None, Some(other)).is_none()
        );
        assert!(sighting_from_manufacturer_data(
            APPLE_COMPANY_ID,
            &payload,
            None,
            Some(BeaconIdentity::default().uuid)
        )
        .is_some());
    }

    #[test]
    fn test_decode_all_entries() {
        let mut data = HashMap::new();
        data.insert(APPLE_COMPANY_ID, create_test_payload());
        data.insert(0x0006, vec![0x01, 0x09]);

        let sightings = decode_all(&data, Some(-70), None);
        assert_eq!(sightings.len(), 1);
        assert_eq!(sightings[0].rssi, Some(-70));
    }
}
