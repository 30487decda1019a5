//! Status banners shown to the user while the beacon runs

use std::fmt;

use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Info,
    Success,
    Warning,
    Error,
}

impl BannerKind {
    pub fn title(&self) -> &'static str {
        match self {
            BannerKind::Info => "Information",
            BannerKind::Success => "Success",
            BannerKind::Warning => "Warning",
            BannerKind::Error => "Error",
        }
    }
}

/// One status line: a severity and a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBanner {
    pub kind: BannerKind,
    pub message: String,
}

impl StatusBanner {
    pub fn new(kind: BannerKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(BannerKind::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(BannerKind::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(BannerKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(BannerKind::Error, message)
    }

    /// Emit through the log at the matching level
    pub fn render(&self) {
        match self.kind {
            BannerKind::Info | BannerKind::Success => info!("{}", self),
            BannerKind::Warning => warn!("{}", self),
            BannerKind::Error => error!("{}", self),
        }
    }
}

impl Default for StatusBanner {
    fn default() -> Self {
        Self::info("Initializing...")
    }
}

impl fmt::Display for StatusBanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.title(), self.message)
    }
}
