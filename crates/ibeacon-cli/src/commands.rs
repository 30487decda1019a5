//! Command handlers for the iBeacon shell

use std::time::Duration;

use ibeacon_ble::{
    BeaconController, BeaconScanner, BeaconSighting, PlatformAdvertiser, PolicyPermissionGate,
    SimulatedRadio,
};
use ibeacon_core::{AdvertisementRecord, APPLE_COMPANY_ID};
use serde::Serialize;
use tracing::info;

use crate::app::BeaconApp;
use crate::cli::{BeaconArgs, Cli, Commands};
use crate::config::ShellConfig;
use crate::error::Result;

const DEFAULT_SCAN_SECS: u64 = 10;

/// Record plus the fields it carries, for `--json` output
#[derive(Debug, Serialize)]
pub struct RecordReport {
    pub record: String,
    pub company_id: u16,
    pub uuid: String,
    pub major: u16,
    pub minor: u16,
    pub tx_power: i8,
}

impl From<&AdvertisementRecord> for RecordReport {
    fn from(record: &AdvertisementRecord) -> Self {
        let identity = record.identity();
        Self {
            record: record.to_string(),
            company_id: APPLE_COMPANY_ID,
            uuid: identity.uuid.to_string(),
            major: identity.major,
            minor: identity.minor,
            tx_power: record.tuning().calibrated_tx_power,
        }
    }
}

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: &Cli, config: ShellConfig) -> Result<()> {
        match cli.command() {
            Commands::Start {
                beacon,
                duration,
                max_attempts,
            } => {
                Self::handle_start_command(config, &beacon, duration, max_attempts, cli.simulate)
                    .await
            }
            Commands::Encode { beacon, json } => Self::handle_encode_command(&config, &beacon, json),
            Commands::Decode { hex, json } => Self::handle_decode_command(&hex, json),
            Commands::Scan {
                duration,
                uuid,
                json,
            } => {
                let mut scanner_config = config.scanner.clone();
                if let Some(uuid) = uuid {
                    scanner_config = scanner_config.with_uuid_filter(uuid);
                }
                Self::handle_scan_command(scanner_config, duration, json).await
            }
            Commands::Config => {
                print!("{}", ShellConfig::example_config());
                Ok(())
            }
        }
    }

    /// Broadcast until shutdown
    async fn handle_start_command(
        mut config: ShellConfig,
        beacon: &BeaconArgs,
        duration: Option<u64>,
        max_attempts: Option<u32>,
        simulate: bool,
    ) -> Result<()> {
        let beacon = config.beacon.clone().with_overrides(beacon);
        if let Some(max_attempts) = max_attempts {
            config.shell.max_attempts = max_attempts;
        }

        let advertiser = if simulate {
            PlatformAdvertiser::simulated(SimulatedRadio::new())
        } else {
            PlatformAdvertiser::new(&config.advertiser)
        };
        let controller = BeaconController::with_advertiser(advertiser, &config.advertiser);
        info!(
            "Using {} advertiser for {}",
            controller.platform_name().await,
            beacon.uuid
        );

        let app = BeaconApp::new(
            controller,
            PolicyPermissionGate::for_current_platform(),
            config.shell.clone(),
        );

        app.launch(&beacon).await?;
        app.run_until_shutdown(duration.map(Duration::from_secs)).await?;
        Ok(())
    }

    /// Print the record for the configured beacon
    fn handle_encode_command(config: &ShellConfig, beacon: &BeaconArgs, json: bool) -> Result<()> {
        let record = config.beacon.clone().with_overrides(beacon).record()?;

        if json {
            println!("{}", serde_json::to_string_pretty(&RecordReport::from(&record))?);
        } else {
            println!("{}", record);
        }
        Ok(())
    }

    fn handle_decode_command(input: &str, json: bool) -> Result<()> {
        let record = decode_record_hex(input)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&RecordReport::from(&record))?);
        } else {
            let identity = record.identity();
            println!("UUID:     {}", identity.uuid);
            println!("Major:    {}", identity.major);
            println!("Minor:    {}", identity.minor);
            println!("TX power: {} dBm", record.tuning().calibrated_tx_power);
        }
        Ok(())
    }

    /// Print sightings until the duration elapses or Ctrl+C
    async fn handle_scan_command(
        config: ibeacon_ble::ScannerConfig,
        duration: Option<u64>,
        json: bool,
    ) -> Result<()> {
        let duration = Duration::from_secs(duration.unwrap_or(DEFAULT_SCAN_SECS));
        let mut scanner = BeaconScanner::new(config);
        let mut sightings = scanner.start().await?;
        info!("Scanning for {}s... Press Ctrl+C to stop", duration.as_secs());

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                sighting = sightings.recv() => match sighting {
                    Some(sighting) => print_sighting(&sighting, json)?,
                    None => break,
                },
                _ = &mut deadline => break,
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        scanner.stop().await?;
        Ok(())
    }
}

/// Parse a hex record, accepting an optional `4c00` company id prefix
pub fn decode_record_hex(input: &str) -> Result<AdvertisementRecord> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let cleaned: String = digits
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let bytes = hex::decode(&cleaned)?;

    let company_prefix = APPLE_COMPANY_ID.to_le_bytes();
    let payload = match bytes.strip_prefix(&company_prefix[..]) {
        Some(rest) if bytes.len() == ibeacon_core::RECORD_LEN + 2 => rest,
        _ => &bytes[..],
    };
    Ok(AdvertisementRecord::parse(payload)?)
}

fn print_sighting(sighting: &BeaconSighting, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(sighting)?);
        return Ok(());
    }

    let distance = sighting
        .distance
        .map(|d| format!("{:.2} m", d))
        .unwrap_or_else(|| "unknown".to_string());
    let rssi = sighting
        .rssi
        .map(|r| format!("{} dBm", r))
        .unwrap_or_else(|| "n/a".to_string());
    println!(
        "{}  rssi {}  distance {} ({:?})",
        sighting.identity, rssi, distance, sighting.proximity
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOLDEN: &str = "0215fda50693a4e24fb1afcfc6eb0764782500640001c5";

    #[test]
    fn test_decode_plain_and_prefixed() {
        let plain = decode_record_hex(GOLDEN).unwrap();
        let prefixed = decode_record_hex(&format!("4c00{}", GOLDEN)).unwrap();
        let spaced = decode_record_hex(&format!("0x{}", GOLDEN.to_uppercase())).unwrap();

        assert_eq!(plain, prefixed);
        assert_eq!(plain, spaced);
        assert_eq!(plain.identity().major, 100);
    }

    #[test]
    fn test_decode_hex_prefix_forms() {
        let upper = decode_record_hex(&format!("0X{}", GOLDEN)).unwrap();
        assert_eq!(upper.to_string(), GOLDEN);

        assert!(matches!(
            decode_record_hex(&format!("0x0x{}", GOLDEN)),
            Err(crate::error::CliError::HexDecoding(_))
        ));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_record_hex("zz"),
            Err(crate::error::CliError::HexDecoding(_))
        ));
        assert!(matches!(
            decode_record_hex("0215"),
            Err(crate::error::CliError::Decode(_))
        ));
    }

    #[test]
    fn test_record_report() {
        let record = decode_record_hex(GOLDEN).unwrap();
        let report = RecordReport::from(&record);
        assert_eq!(report.record, GOLDEN);
        assert_eq!(report.company_id, 0x004C);
        assert_eq!(report.tx_power, -59);
    }
}
