//! In-process stand-in for a host Bluetooth stack
//!
//! Behaves like the mobile stacks: adapter checks fail synchronously, while
//! start and stop outcomes arrive later through a callback on another task.
//! Commands take effect in the order they were issued, so a start whose
//! callback lands after a later stop never comes back on air. Every submitted
//! record is logged so tests can assert that no two broadcasts ever
//! overlapped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ibeacon_core::{AdvertisementRecord, BeaconError, Result as BeaconResult};
use tracing::debug;

use crate::error::BleError;
use crate::pending::{wait_for, PendingSlot, PendingToken};
use crate::protocol::AdvertiseSettings;

use super::BeaconAdvertiser;

// ----------------------------------------------------------------------------
// Scripted Outcomes
// ----------------------------------------------------------------------------

/// What the simulated stack reports for the next start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatedOutcome {
    Succeed,
    Fail(BeaconError),
    /// Never call back
    Hang,
}

#[derive(Debug)]
struct RadioLog {
    powered: bool,
    supported: bool,
    authorized: bool,
    callback_delay: Duration,
    script: VecDeque<SimulatedOutcome>,
    submissions: Vec<AdvertisementRecord>,
    /// Sequence number of the last command handed to the stack
    issued: u64,
    /// Start the stack is committed to: issued and not yet stopped or failed
    requested: Option<u64>,
    active: Option<(u64, AdvertisementRecord)>,
    overlaps: usize,
    stops: usize,
}

impl Default for RadioLog {
    fn default() -> Self {
        Self {
            powered: true,
            supported: true,
            authorized: true,
            callback_delay: Duration::from_millis(20),
            script: VecDeque::new(),
            submissions: Vec::new(),
            issued: 0,
            requested: None,
            active: None,
            overlaps: 0,
            stops: 0,
        }
    }
}

impl RadioLog {
    fn next_command(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }
}

// ----------------------------------------------------------------------------
// Simulated Radio
// ----------------------------------------------------------------------------

/// Fake peripheral stack driven by a script of outcomes
pub struct SimulatedRadio {
    log: Arc<Mutex<RadioLog>>,
    pending: PendingSlot<BeaconResult<()>>,
}

impl SimulatedRadio {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(RadioLog::default())),
            pending: PendingSlot::new(),
        }
    }

    /// Delay before the stack reports an outcome
    pub fn with_callback_delay(self, delay: Duration) -> Self {
        self.log().callback_delay = delay;
        self
    }

    /// Handle for inspecting and steering the radio from outside the session
    pub fn probe(&self) -> RadioProbe {
        RadioProbe {
            log: Arc::clone(&self.log),
        }
    }

    fn log(&self) -> MutexGuard<'_, RadioLog> {
        lock(&self.log)
    }

    /// Run `apply` on another task after `delay` and deliver its outcome to
    /// the request identified by `token`
    fn schedule_callback<F>(&self, token: PendingToken, delay: Duration, apply: F)
    where
        F: FnOnce(&mut RadioLog) -> Option<BeaconResult<()>> + Send + 'static,
    {
        let slot = self.pending.clone();
        let log = Arc::clone(&self.log);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let outcome = apply(&mut lock(&log));
            if let Some(outcome) = outcome {
                if !slot.resolve(token, outcome) {
                    debug!(
                        "Simulated callback for request {} arrived with no waiter",
                        token.sequence()
                    );
                }
            }
        });
    }
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BeaconAdvertiser for SimulatedRadio {
    async fn start_advertising(
        &mut self,
        record: &AdvertisementRecord,
        _settings: &AdvertiseSettings,
    ) -> BeaconResult<()> {
        let request = self.pending.arm()?;
        let (command, delay) = {
            let mut log = self.log();
            if !log.powered {
                return Err(BleError::AdapterPoweredOff.into());
            }
            if !log.supported {
                return Err(BleError::PeripheralUnsupported(
                    "simulated adapter has no peripheral role".to_string(),
                )
                .into());
            }
            if !log.authorized {
                return Err(BleError::NotAuthorized("simulated permission denied".to_string()).into());
            }
            if log.requested.is_some() {
                log.overlaps += 1;
            }
            log.submissions.push(*record);
            let command = log.next_command();
            log.requested = Some(command);
            (command, log.callback_delay)
        };

        let record = *record;
        self.schedule_callback(request.token(), delay, move |log| {
            let outcome = log.script.pop_front().unwrap_or(SimulatedOutcome::Succeed);
            match outcome {
                SimulatedOutcome::Succeed => {
                    if log.requested == Some(command) {
                        log.active = Some((command, record));
                    } else {
                        debug!("Start {} superseded by a later command", command);
                    }
                    Some(Ok(()))
                }
                SimulatedOutcome::Fail(err) => {
                    if log.requested == Some(command) {
                        log.requested = None;
                    }
                    Some(Err(err))
                }
                SimulatedOutcome::Hang => None,
            }
        });

        wait_for(&self.pending, request, None).await?
    }

    async fn stop_advertising(&mut self) -> BeaconResult<()> {
        let request = self.pending.arm()?;
        let (command, delay) = {
            let mut log = self.log();
            let command = log.next_command();
            log.requested = None;
            (command, log.callback_delay)
        };

        self.schedule_callback(request.token(), delay, move |log| {
            if matches!(log.active, Some((started, _)) if started < command) {
                log.active = None;
            }
            log.stops += 1;
            Some(Ok(()))
        });

        wait_for(&self.pending, request, None).await?
    }

    fn is_advertising(&self) -> bool {
        self.log().active.is_some()
    }

    fn platform_name(&self) -> &'static str {
        "simulated"
    }
}

// ----------------------------------------------------------------------------
// Radio Probe
// ----------------------------------------------------------------------------

/// Shared view of a [`SimulatedRadio`] for tests and the CLI
#[derive(Clone)]
pub struct RadioProbe {
    log: Arc<Mutex<RadioLog>>,
}

impl RadioProbe {
    /// Queue the outcome of a future start request
    pub fn push_outcome(&self, outcome: SimulatedOutcome) {
        lock(&self.log).script.push_back(outcome);
    }

    pub fn set_powered(&self, powered: bool) {
        lock(&self.log).powered = powered;
    }

    pub fn set_supported(&self, supported: bool) {
        lock(&self.log).supported = supported;
    }

    pub fn set_authorized(&self, authorized: bool) {
        lock(&self.log).authorized = authorized;
    }

    /// Delay for callbacks of requests issued from now on
    pub fn set_callback_delay(&self, delay: Duration) {
        lock(&self.log).callback_delay = delay;
    }

    /// Every record ever submitted, in order
    pub fn submissions(&self) -> Vec<AdvertisementRecord> {
        lock(&self.log).submissions.clone()
    }

    /// Record currently on air
    pub fn active(&self) -> Option<AdvertisementRecord> {
        lock(&self.log).active.map(|(_, record)| record)
    }

    /// Starts submitted while the stack was still committed to an earlier one
    pub fn overlaps(&self) -> usize {
        lock(&self.log).overlaps
    }

    pub fn stops(&self) -> usize {
        lock(&self.log).stops
    }
}

fn lock(log: &Mutex<RadioLog>) -> MutexGuard<'_, RadioLog> {
    log.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibeacon_core::{encode, AdvertisingTuning, BeaconIdentity, ErrorKind};

    fn create_test_record() -> AdvertisementRecord {
        encode(&BeaconIdentity::default(), &AdvertisingTuning::default())
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut radio = SimulatedRadio::new().with_callback_delay(Duration::from_millis(1));
        let probe = radio.probe();
        let record = create_test_record();

        radio
            .start_advertising(&record, &AdvertiseSettings::default())
            .await
            .unwrap();
        assert!(radio.is_advertising());
        assert_eq!(probe.active(), Some(record));

        radio.stop_advertising().await.unwrap();
        assert!(!radio.is_advertising());
        assert_eq!(probe.stops(), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let mut radio = SimulatedRadio::new().with_callback_delay(Duration::from_millis(1));
        let probe = radio.probe();
        probe.push_outcome(SimulatedOutcome::Fail(BeaconError::start_failed(
            2,
            "too many advertisers",
        )));

        let err = radio
            .start_advertising(&create_test_record(), &AdvertiseSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err, BeaconError::start_failed(2, "too many advertisers"));
        assert!(probe.active().is_none());
        assert_eq!(probe.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_powered_off_rejects_synchronously() {
        let mut radio = SimulatedRadio::new();
        let probe = radio.probe();
        probe.set_powered(false);

        let err = radio
            .start_advertising(&create_test_record(), &AdvertiseSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RadioUnavailable);
        assert!(probe.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_stop_supersedes_unanswered_start() {
        let mut radio = SimulatedRadio::new().with_callback_delay(Duration::from_millis(40));
        let probe = radio.probe();
        let record = create_test_record();

        let settings = AdvertiseSettings::default();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            radio.start_advertising(&record, &settings),
        )
        .await;
        assert!(abandoned.is_err());

        probe.set_callback_delay(Duration::from_millis(1));
        radio.stop_advertising().await.unwrap();

        // Let the first start's callback land
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(probe.active().is_none());
        assert!(!radio.is_advertising());
        assert_eq!(probe.overlaps(), 0);
    }
}
