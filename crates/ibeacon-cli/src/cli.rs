//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Use the in-process simulated radio instead of the host Bluetooth stack
    #[arg(long, global = true)]
    pub simulate: bool,
}

/// Beacon fields that override the configured identity
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BeaconArgs {
    /// Proximity UUID (canonical 8-4-4-4-12 form)
    #[arg(long)]
    pub uuid: Option<String>,

    /// Major identifier (0-65535)
    #[arg(long, allow_negative_numbers = true)]
    pub major: Option<i64>,

    /// Minor identifier (0-65535)
    #[arg(long, allow_negative_numbers = true)]
    pub minor: Option<i64>,

    /// Calibrated RSSI at 1 m in dBm (-128..127)
    #[arg(long, allow_negative_numbers = true)]
    pub tx_power: Option<i64>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Broadcast the beacon until Ctrl+C (the default command)
    Start {
        #[command(flatten)]
        beacon: BeaconArgs,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Permission and start attempts before giving up
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Print the advertisement record for a beacon and exit
    Encode {
        #[command(flatten)]
        beacon: BeaconArgs,

        /// Print JSON instead of hex
        #[arg(long)]
        json: bool,
    },
    /// Decode a hex advertisement record
    Decode {
        /// 23-byte record, optionally prefixed with the 4c00 company id
        hex: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Listen for iBeacon frames from other devices
    Scan {
        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Only report beacons with this proximity UUID
        #[arg(long)]
        uuid: Option<Uuid>,

        /// Print one JSON object per sighting
        #[arg(long)]
        json: bool,
    },
    /// Print an example configuration file
    Config,
}

impl Cli {
    /// Subcommand to run, `start` when none was given
    pub fn command(&self) -> Commands {
        match &self.command {
            Some(command) => command.clone(),
            None => Commands::Start {
                beacon: BeaconArgs::default(),
                duration: None,
                max_attempts: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_start() {
        let cli = Cli::parse_from(["ibeacon"]);
        assert!(matches!(cli.command(), Commands::Start { duration: None, .. }));
    }

    #[test]
    fn test_negative_tx_power() {
        let cli = Cli::parse_from(["ibeacon", "encode", "--major", "7", "--tx-power", "-65"]);
        match cli.command() {
            Commands::Encode { beacon, json } => {
                assert_eq!(beacon.major, Some(7));
                assert_eq!(beacon.tx_power, Some(-65));
                assert!(!json);
            }
            _ => panic!("expected encode"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["ibeacon", "start", "--simulate", "-v", "--duration", "5"]);
        assert!(cli.simulate);
        assert!(cli.verbose);
        assert!(matches!(cli.command(), Commands::Start { duration: Some(5), .. }));
    }
}
