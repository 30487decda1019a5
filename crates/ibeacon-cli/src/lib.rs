//! iBeacon shell library
//!
//! Components behind the `ibeacon` binary: argument parsing, layered
//! configuration, the launch/retry application loop and status banners.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod status;

pub use app::BeaconApp;
pub use cli::{Cli, Commands};
pub use config::ShellConfig;
pub use error::{CliError, Result};
pub use status::{BannerKind, StatusBanner};
