//! Linux BLE advertising implementation using bluer (BlueZ)

use ibeacon_core::{AdvertisementRecord, BeaconError, Result as BeaconResult};
use tracing::{debug, info};

use crate::config::AdvertiserConfig;
use crate::error::BleError;
use crate::protocol::{failure_code, manufacturer_data_map, AdvertiseSettings};

use super::BeaconAdvertiser;

// ----------------------------------------------------------------------------
// Linux Implementation
// ----------------------------------------------------------------------------

pub struct LinuxAdvertiser {
    session: Option<bluer::Session>,
    adapter: Option<bluer::Adapter>,
    advertisement_handle: Option<bluer::adv::AdvertisementHandle>,
    adapter_name: Option<String>,
    power_on_adapter: bool,
}

impl LinuxAdvertiser {
    pub fn new(config: &AdvertiserConfig) -> Self {
        Self {
            session: None,
            adapter: None,
            advertisement_handle: None,
            adapter_name: config.adapter_name.clone(),
            power_on_adapter: config.power_on_adapter,
        }
    }

    async fn initialize(&mut self) -> BeaconResult<bluer::Adapter> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }

        let session = bluer::Session::new()
            .await
            .map_err(|e| BleError::AdapterNotAvailable(format!("BlueZ session: {}", e)))?;

        let adapter = match &self.adapter_name {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|e| BleError::AdapterNotAvailable(format!("BLE adapter: {}", e)))?;

        self.session = Some(session);
        self.adapter = Some(adapter.clone());
        info!("Linux BLE adapter {} initialized for advertising", adapter.name());
        Ok(adapter)
    }

    async fn ensure_powered(&self, adapter: &bluer::Adapter) -> BeaconResult<()> {
        if adapter.is_powered().await.unwrap_or(false) {
            return Ok(());
        }

        if !self.power_on_adapter {
            return Err(BleError::AdapterPoweredOff.into());
        }

        adapter.set_powered(true).await.map_err(classify_bluer_error)?;
        info!("Powered on adapter {}", adapter.name());
        Ok(())
    }
}

#[async_trait::async_trait]
impl BeaconAdvertiser for LinuxAdvertiser {
    async fn start_advertising(
        &mut self,
        record: &AdvertisementRecord,
        settings: &AdvertiseSettings,
    ) -> BeaconResult<()> {
        let adapter = self.initialize().await?;
        self.ensure_powered(&adapter).await?;

        if let Some(handle) = self.advertisement_handle.take() {
            debug!("Releasing previous advertisement before resubmitting");
            drop(handle);
        }

        let interval = settings.mode.interval();
        let advertisement = bluer::adv::Advertisement {
            advertisement_type: bluer::adv::Type::Broadcast,
            manufacturer_data: manufacturer_data_map(record),
            discoverable: Some(false),
            min_interval: Some(interval),
            max_interval: Some(interval),
            tx_power: Some(settings.tx_power_level.dbm()),
            ..Default::default()
        };

        // Resolves once BlueZ has registered the advertisement with the controller
        let handle = adapter
            .advertise(advertisement)
            .await
            .map_err(classify_bluer_error)?;

        self.advertisement_handle = Some(handle);
        info!(
            "Started BLE advertising of {} on {}",
            record.identity(),
            adapter.name()
        );
        Ok(())
    }

    async fn stop_advertising(&mut self) -> BeaconResult<()> {
        if let Some(handle) = self.advertisement_handle.take() {
            drop(handle); // Dropping the handle unregisters the advertisement
            info!("Stopped BLE advertising");
        }
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        self.advertisement_handle.is_some()
    }

    fn platform_name(&self) -> &'static str {
        "linux-bluez"
    }
}

// ----------------------------------------------------------------------------
// Error Mapping
// ----------------------------------------------------------------------------

fn classify_bluer_error(err: bluer::Error) -> BeaconError {
    use bluer::ErrorKind;

    let message = err.to_string();
    match err.kind {
        ErrorKind::NotAuthorized | ErrorKind::NotPermitted => BeaconError::unauthorized(message),
        ErrorKind::NotSupported => BeaconError::unsupported(message),
        ErrorKind::NotReady | ErrorKind::NotAvailable => BeaconError::radio_unavailable(message),
        ErrorKind::AlreadyExists => {
            BeaconError::start_failed(failure_code::ALREADY_STARTED, message)
        }
        ErrorKind::InvalidArguments => {
            BeaconError::start_failed(failure_code::DATA_TOO_LARGE, message)
        }
        _ => BeaconError::start_failed(failure_code::INTERNAL_ERROR, message),
    }
}
