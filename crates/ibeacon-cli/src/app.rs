//! Beacon application: permission gate, delayed start, retry and shutdown

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use ibeacon_ble::{BeaconAdvertiser, BeaconController, PermissionGate};
use ibeacon_core::{BeaconError, SessionState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{BeaconConfig, ShellSettings};
use crate::error::{CliError, Result};
use crate::status::StatusBanner;

/// Why a launch attempt did not put the beacon on air
enum AttemptFailure {
    PermissionDenied,
    Start(BeaconError),
}

/// Drives one advertising session the way the mobile app does
pub struct BeaconApp<A: BeaconAdvertiser, G: PermissionGate> {
    controller: BeaconController<A>,
    gate: G,
    settings: ShellSettings,
    status: watch::Sender<StatusBanner>,
}

impl<A: BeaconAdvertiser, G: PermissionGate> BeaconApp<A, G> {
    pub fn new(controller: BeaconController<A>, gate: G, settings: ShellSettings) -> Self {
        let (status, _) = watch::channel(StatusBanner::default());
        Self {
            controller,
            gate,
            settings,
            status,
        }
    }

    pub fn controller(&self) -> &BeaconController<A> {
        &self.controller
    }

    /// Latest banner and every later one
    pub fn status(&self) -> watch::Receiver<StatusBanner> {
        self.status.subscribe()
    }

    /// Request permissions, wait, then start; retry the whole sequence on failure
    ///
    /// Every failure is retried the same way regardless of its kind, up to
    /// `max_attempts`. The first start waits `startup_delay`, later ones
    /// `retry_delay`.
    pub async fn launch(&self, beacon: &BeaconConfig) -> Result<String> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_failure = AttemptFailure::PermissionDenied;

        for attempt in 1..=max_attempts {
            let delay = if attempt == 1 {
                self.settings.startup_delay()
            } else {
                self.settings.retry_delay()
            };

            if attempt > 1 {
                self.show(StatusBanner::info(format!(
                    "Requesting permissions (attempt {}/{})...",
                    attempt, max_attempts
                )));
            }

            match self.attempt(beacon, delay).await {
                Ok(message) => return Ok(message),
                Err(failure) => {
                    if attempt < max_attempts && matches!(failure, AttemptFailure::PermissionDenied)
                    {
                        tokio::time::sleep(self.settings.retry_delay()).await;
                    }
                    last_failure = failure;
                }
            }
        }

        Err(match last_failure {
            AttemptFailure::PermissionDenied => CliError::PermissionDenied {
                attempts: max_attempts,
            },
            AttemptFailure::Start(err) => CliError::Beacon(err),
        })
    }

    async fn attempt(
        &self,
        beacon: &BeaconConfig,
        delay: Duration,
    ) -> std::result::Result<String, AttemptFailure> {
        if !self.request_permissions().await {
            return Err(AttemptFailure::PermissionDenied);
        }

        tokio::time::sleep(delay).await;
        self.show(StatusBanner::info("Starting beacon..."));

        match self
            .controller
            .start_beacon(&beacon.uuid, beacon.major, beacon.minor, beacon.tx_power)
            .await
        {
            Ok(message) => {
                self.show(StatusBanner::success(message.clone()));
                Ok(message)
            }
            Err(err) => {
                self.show(StatusBanner::error(format!(
                    "Failed to start the beacon [{}]: {}",
                    err.code(),
                    err
                )));
                Err(AttemptFailure::Start(err))
            }
        }
    }

    async fn request_permissions(&self) -> bool {
        match self.gate.ensure_ble_permissions().await {
            Ok(true) => {
                self.show(StatusBanner::success("Bluetooth permissions granted"));
                true
            }
            Ok(false) => {
                self.show(StatusBanner::error(
                    "Bluetooth permissions denied. Allow them to use the beacon.",
                ));
                false
            }
            Err(err) => {
                self.show(StatusBanner::error(format!(
                    "Error while requesting permissions: {}",
                    err
                )));
                false
            }
        }
    }

    /// Keep advertising until Ctrl+C or `duration`, then stop
    pub async fn run_until_shutdown(&self, duration: Option<Duration>) -> Result<String> {
        match duration {
            Some(duration) => {
                self.show(StatusBanner::info(format!(
                    "Advertising for {}s (Ctrl+C to stop early)",
                    duration.as_secs()
                )));
                self.run_until(async move {
                    tokio::select! {
                        _ = tokio::time::sleep(duration) => Ok(()),
                        signal = tokio::signal::ctrl_c() => signal,
                    }
                })
                .await
            }
            None => {
                self.show(StatusBanner::info("Advertising (Ctrl+C to stop)"));
                self.run_until(tokio::signal::ctrl_c()).await
            }
        }
    }

    /// Keep advertising until `shutdown` resolves, then stop
    ///
    /// The beacon is stopped even when `shutdown` fails; that error is
    /// reported afterwards.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<String>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let watcher = self.watch_session();

        let signal = shutdown.await;
        let stopped = self.controller.stop_beacon().await;
        watcher.abort();

        let message = stopped?;
        self.show(StatusBanner::info(message.clone()));
        signal.context("waiting for shutdown signal")?;
        Ok(message)
    }

    /// Log session state changes while the beacon runs
    fn watch_session(&self) -> JoinHandle<()> {
        let mut states = self.controller.subscribe();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = states.borrow_and_update().clone();
                match &state {
                    SessionState::Failed { reason } => {
                        StatusBanner::warning(format!("Session failed: {}", reason)).render()
                    }
                    other => debug!("Session state: {}", other),
                }
            }
        })
    }

    fn show(&self, banner: StatusBanner) {
        banner.render();
        self.status.send_replace(banner);
    }
}
