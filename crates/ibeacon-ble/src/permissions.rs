//! Runtime permission gate
//!
//! Mobile hosts require runtime grants before the radio may advertise. The
//! desktop stacks enforce access through the OS itself (BlueZ policy,
//! macOS privacy prompts), so their requirement set is empty and a refusal
//! surfaces later as [`BeaconError::Unauthorized`] from the session.

use std::collections::BTreeSet;
use std::fmt;

use ibeacon_core::{BeaconError, Result as BeaconResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// First Android API level with the split Bluetooth permissions
pub const ANDROID_S_API_LEVEL: u32 = 31;

// ----------------------------------------------------------------------------
// Permissions and Platforms
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    BluetoothAdvertise,
    AccessFineLocation,
}

impl Permission {
    /// Manifest name of the permission
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::BluetoothAdvertise => "android.permission.BLUETOOTH_ADVERTISE",
            Permission::AccessFineLocation => "android.permission.ACCESS_FINE_LOCATION",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android { api_level: u32 },
    Ios,
    Linux,
    MacOs,
    Other,
}

impl Platform {
    /// Platform this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Other
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android { api_level } => write!(f, "android (API {})", api_level),
            Platform::Ios => f.write_str("ios"),
            Platform::Linux => f.write_str("linux"),
            Platform::MacOs => f.write_str("macos"),
            Platform::Other => f.write_str("other"),
        }
    }
}

/// Runtime grants needed before advertising on `platform`
pub fn required_permissions(platform: Platform) -> Vec<Permission> {
    match platform {
        Platform::Android { api_level } if api_level >= ANDROID_S_API_LEVEL => vec![
            Permission::BluetoothAdvertise,
            Permission::AccessFineLocation,
        ],
        Platform::Android { .. } => vec![Permission::AccessFineLocation],
        Platform::Ios | Platform::Linux | Platform::MacOs | Platform::Other => Vec::new(),
    }
}

// ----------------------------------------------------------------------------
// Permission Gate Trait
// ----------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait PermissionGate: Send + Sync {
    /// Request (or check) the grants advertising needs
    ///
    /// `Ok(false)` means the user refused; `Err` means the request itself
    /// could not be made.
    async fn ensure_ble_permissions(&self) -> BeaconResult<bool>;
}

/// Gate with a fixed answer
#[derive(Debug, Clone)]
pub struct StaticPermissionGate {
    answer: Result<bool, BeaconError>,
}

impl StaticPermissionGate {
    pub fn granted() -> Self {
        Self { answer: Ok(true) }
    }

    pub fn denied() -> Self {
        Self { answer: Ok(false) }
    }

    pub fn failing(error: BeaconError) -> Self {
        Self { answer: Err(error) }
    }
}

#[async_trait::async_trait]
impl PermissionGate for StaticPermissionGate {
    async fn ensure_ble_permissions(&self) -> BeaconResult<bool> {
        self.answer.clone()
    }
}

/// Gate that checks a set of grants against the platform requirement matrix
#[derive(Debug, Clone)]
pub struct PolicyPermissionGate {
    platform: Platform,
    granted: BTreeSet<Permission>,
}

impl PolicyPermissionGate {
    pub fn new(platform: Platform, granted: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            platform,
            granted: granted.into_iter().collect(),
        }
    }

    /// Gate for the build platform with nothing granted
    pub fn for_current_platform() -> Self {
        Self {
            platform: Platform::current(),
            granted: BTreeSet::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn grant(&mut self, permission: Permission) {
        self.granted.insert(permission);
    }

    /// Required grants not yet given
    pub fn missing(&self) -> Vec<Permission> {
        required_permissions(self.platform)
            .into_iter()
            .filter(|permission| !self.granted.contains(permission))
            .collect()
    }
}

#[async_trait::async_trait]
impl PermissionGate for PolicyPermissionGate {
    async fn ensure_ble_permissions(&self) -> BeaconResult<bool> {
        let missing = self.missing();
        if missing.is_empty() {
            debug!("All Bluetooth permissions granted on {}", self.platform);
            return Ok(true);
        }

        for permission in &missing {
            warn!("Permission {} not granted on {}", permission, self.platform);
        }
        Ok(false)
    }
}
